//! The per-page extraction sequence.
//!
//! A sequence is a fixed list of stages, each an ordered list of steps run
//! against one renderer session. Steps are strictly sequential: a later step
//! may depend on document state produced by an earlier one (the size chart
//! only exists after its toggle was clicked). Execution short-circuits on the
//! first failing step of a stage.

use crate::error::{Result, ScanError};
use crate::record::{Field, ProductRecord};
use crate::renderer::{RendererSession, Script, ScriptField, Step};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// How failures in optional stages are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionPolicy {
    /// Any failing step discards the whole record.
    #[default]
    Strict,
    /// A failing optional stage leaves its fields empty.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    Required,
    Optional,
}

#[derive(Debug, Clone)]
struct Action {
    step: Step,
    field: Option<Field>,
}

#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    policy: StagePolicy,
    actions: Vec<Action>,
}

impl Stage {
    pub fn required(name: impl Into<String>) -> Self {
        Self::new(name, StagePolicy::Required)
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self::new(name, StagePolicy::Optional)
    }

    fn new(name: impl Into<String>, policy: StagePolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            actions: Vec::new(),
        }
    }

    /// Appends an interaction whose value is discarded.
    pub fn then(mut self, step: Step) -> Self {
        self.actions.push(Action { step, field: None });
        self
    }

    /// Appends a read whose value lands in `field`.
    pub fn read(mut self, step: Step, field: Field) -> Self {
        self.actions.push(Action {
            step,
            field: Some(field),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> StagePolicy {
        self.policy
    }

    /// Runs every action in order. On failure returns the failing step's
    /// label; nothing from this stage has been written to `record` then.
    async fn run<S: RendererSession>(
        &self,
        session: &mut S,
        record: &mut ProductRecord,
    ) -> std::result::Result<(), (String, ScanError)> {
        let mut staged: Vec<(Field, Value)> = Vec::new();
        for action in &self.actions {
            debug!("{} [{}] {}", record.url, self.name, action.step.describe());
            let value = session
                .run(&action.step)
                .await
                .map_err(|e| (action.step.describe(), e))?;
            if let Some(field) = action.field {
                staged.push((field, value));
            }
        }
        for (field, value) in staged {
            record.apply(field, value);
        }
        Ok(())
    }
}

/// CSS selectors describing the detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    pub ready: String,
    pub name: String,
    pub price: String,
    pub image: String,
    pub breadcrumbs: String,
    pub description: String,
    pub description_items: String,
    pub sizes: String,
    pub size_note: String,
    pub keywords: String,
    pub size_chart_toggle: String,
    pub size_chart_table: String,
    pub review: String,
    pub review_rating: String,
    pub review_title: String,
    pub review_date: String,
    pub review_author: String,
    pub review_body: String,
    pub coordinate: String,
    pub coordinate_name: String,
    pub coordinate_price: String,
    pub coordinate_link: String,
    pub coordinate_image: String,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            ready: ".articlePurchaseBox".to_string(),
            name: ".articlePurchaseBox .itemTitle".to_string(),
            price: ".articlePurchaseBox .price-value".to_string(),
            image: ".article_image_wrapper img".to_string(),
            breadcrumbs: ".breadcrumbList li a".to_string(),
            description: ".itemFeature .heading".to_string(),
            description_items: ".articleFeatures li".to_string(),
            sizes: ".sizeSelectorListItemButton".to_string(),
            size_note: ".sizeFitBar .label".to_string(),
            keywords: "meta[name=keywords]".to_string(),
            size_chart_toggle: ".sizeDescriptionButton".to_string(),
            size_chart_table: ".sizeChartTable".to_string(),
            review: ".BVRRContentReview".to_string(),
            review_rating: ".BVRRRatingNumber".to_string(),
            review_title: ".BVRRReviewTitle".to_string(),
            review_date: ".BVRRReviewDate".to_string(),
            review_author: ".BVRRNickname".to_string(),
            review_body: ".BVRRReviewText".to_string(),
            coordinate: ".coordinateItems li".to_string(),
            coordinate_name: ".title".to_string(),
            coordinate_price: ".price".to_string(),
            coordinate_link: "a".to_string(),
            coordinate_image: "img".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionSequence {
    stages: Vec<Stage>,
    policy: ExtractionPolicy,
}

impl ExtractionSequence {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            policy: ExtractionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ExtractionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The product detail sequence: page ready, summary fields, descriptions,
    /// sizes, keywords, then the size chart (revealed by a click), reviews and
    /// coordinated products.
    pub fn product_detail(selectors: &DetailSelectors, wait_timeout: Duration) -> Self {
        let s = selectors;
        let attr = |selector: &str, attr: &str| Step::Attr {
            selector: selector.to_string(),
            attr: attr.to_string(),
        };

        let stages = vec![
            Stage::required("page").then(Step::WaitVisible {
                selector: s.ready.clone(),
                timeout: wait_timeout,
            }),
            Stage::required("summary")
                .read(Step::Text(s.name.clone()), Field::Name)
                .read(Step::Text(s.price.clone()), Field::Price)
                .read(attr(&s.image, "src"), Field::ImageUrl)
                .read(Step::TextAll(s.breadcrumbs.clone()), Field::Breadcrumbs),
            Stage::optional("description")
                .read(Step::Text(s.description.clone()), Field::Description)
                .read(Step::TextAll(s.description_items.clone()), Field::DescriptionItems),
            Stage::optional("sizes")
                .read(Step::TextAll(s.sizes.clone()), Field::Sizes)
                .read(Step::Text(s.size_note.clone()), Field::SizeNote),
            Stage::optional("keywords").read(attr(&s.keywords, "content"), Field::Keywords),
            Stage::optional("size_chart")
                .then(Step::Click(s.size_chart_toggle.clone()))
                .then(Step::WaitVisible {
                    selector: s.size_chart_table.clone(),
                    timeout: wait_timeout,
                })
                .read(
                    Step::Script(Script::Table {
                        selector: s.size_chart_table.clone(),
                    }),
                    Field::SizeChart,
                ),
            Stage::optional("reviews").read(
                Step::Script(Script::Records {
                    scope: s.review.clone(),
                    fields: vec![
                        ScriptField::text("rating", &s.review_rating),
                        ScriptField::text("title", &s.review_title),
                        ScriptField::text("date", &s.review_date),
                        ScriptField::text("author", &s.review_author),
                        ScriptField::text("body", &s.review_body),
                    ],
                }),
                Field::Reviews,
            ),
            Stage::optional("coordinates").read(
                Step::Script(Script::Records {
                    scope: s.coordinate.clone(),
                    fields: vec![
                        ScriptField::text("name", &s.coordinate_name),
                        ScriptField::text("price", &s.coordinate_price),
                        ScriptField::attr("url", &s.coordinate_link, "href"),
                        ScriptField::attr("image_url", &s.coordinate_image, "src"),
                    ],
                }),
                Field::Coordinates,
            ),
        ];

        Self::new(stages)
    }

    /// Scrapes one detail page into a record.
    ///
    /// Navigation and required stages always abort on failure. Optional
    /// stages abort too under [`ExtractionPolicy::Strict`].
    pub async fn extract<S: RendererSession>(
        &self,
        session: &mut S,
        url: &str,
    ) -> Result<ProductRecord> {
        let mut record = ProductRecord::new(url);

        session
            .run(&Step::Navigate(url.to_string()))
            .await
            .map_err(|e| ScanError::Extraction {
                url: url.to_string(),
                step: "navigate".to_string(),
                reason: e.to_string(),
            })?;

        for stage in &self.stages {
            if let Err((step, e)) = stage.run(session, &mut record).await {
                let fatal = stage.policy == StagePolicy::Required
                    || self.policy == ExtractionPolicy::Strict;
                if fatal {
                    return Err(ScanError::Extraction {
                        url: url.to_string(),
                        step: format!("{}: {}", stage.name, step),
                        reason: e.to_string(),
                    });
                }
                debug!("Skipping stage '{}' for {}: {}", stage.name, url, e);
            }
        }

        absolutize_image(&mut record);
        Ok(record)
    }
}

// Image sources are often root-relative.
fn absolutize_image(record: &mut ProductRecord) {
    if record.image_url.is_empty() {
        return;
    }
    if let Ok(base) = Url::parse(&record.url)
        && let Ok(resolved) = base.join(&record.image_url)
    {
        record.image_url = resolved.to_string();
    }
}
