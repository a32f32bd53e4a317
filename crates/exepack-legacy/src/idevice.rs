//! Per-class extraction of legacy idevices.
//!
//! A handler only reads the legacy tree. It returns [`Extracted`] fields
//! tagged by how they must be post-processed; rewriting, escaping and id
//! assignment happen in the migrator.

use std::collections::BTreeMap;

use crate::query::{LegacyDocument, Query};
use crate::xml::NodeRef;

pub const TEXT: &str = "text";
pub const CASE_STUDY: &str = "casestudy";
pub const IMAGE_GALLERY: &str = "image-gallery";

/// A field value before rewriting.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// HTML fragment; embedded references are rewritten.
    Html(String),
    /// Plain text re-embedded into HTML; escaped.
    Text(String),
    /// A bare resource path; rewritten as one reference.
    Resource(String),
    List(Vec<BTreeMap<String, Payload>>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extracted {
    pub kind: &'static str,
    pub title: String,
    pub fields: BTreeMap<String, Payload>,
    /// Expected fields that were absent and defaulted to empty.
    pub missing: Vec<String>,
}

impl Extracted {
    fn new(kind: &'static str, title: String) -> Self {
        Self {
            kind,
            title,
            ..Self::default()
        }
    }

    fn html(&mut self, key: &'static str, value: Option<String>) {
        let value = self.required(key, value);
        self.fields.insert(key.to_string(), Payload::Html(value));
    }

    fn required(&mut self, path: impl Into<String>, value: Option<String>) -> String {
        value.unwrap_or_else(|| {
            self.missing.push(path.into());
            String::new()
        })
    }
}

/// Why an idevice produced no unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Skip {
    NoPayload,
    Malformed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    FreeText,
    /// Text spread over a `fields` list of text-area instances.
    FieldList,
    Reflection,
    CaseStudy,
    ImageGallery,
    Generic,
}

impl Handler {
    pub fn for_class(class: &str) -> Self {
        match class {
            "FreeTextIdevice" | "FreeTextfpdIdevice" => Self::FreeText,
            "GenericIdevice" => Self::FieldList,
            "ReflectionIdevice" | "ReflectionfpdIdevice" => Self::Reflection,
            "CaseStudyIdevice" => Self::CaseStudy,
            "ImageGalleryIdevice" => Self::ImageGallery,
            _ => Self::Generic,
        }
    }

    /// Field holding the unit's main HTML.
    pub fn primary_field(self) -> Option<&'static str> {
        match self {
            Self::FreeText | Self::FieldList | Self::Reflection | Self::Generic => Some("textTextarea"),
            Self::CaseStudy => Some("history"),
            Self::ImageGallery => None,
        }
    }

    pub fn extract(self, doc: &LegacyDocument, idevice: NodeRef) -> Result<Extracted, Skip> {
        if doc.field_names(idevice).is_empty() {
            return Err(Skip::Malformed("idevice has no fields".into()));
        }
        let title = doc
            .text(idevice, "_title")
            .or_else(|| doc.text(idevice, "title"))
            .unwrap_or_default();

        match self {
            Self::FreeText => {
                let mut out = Extracted::new(TEXT, title);
                let content = doc
                    .field(idevice, "content")
                    .and_then(|f| doc.field_content(f).or_else(|| doc.scalar(f)));
                out.html("textTextarea", content);
                Ok(out)
            }
            Self::FieldList => {
                let mut out = Extracted::new(TEXT, title);
                let parts: Vec<String> = Query::new()
                    .field("fields")
                    .items()
                    .all(doc, idevice)
                    .into_iter()
                    .filter_map(|field| doc.field_content(field))
                    .filter(|content| !content.trim().is_empty())
                    .collect();
                out.html("textTextarea", (!parts.is_empty()).then(|| parts.join("\n")));
                Ok(out)
            }
            Self::Reflection => {
                let mut out = Extracted::new(TEXT, title);
                out.html("textTextarea", text_area(doc, idevice, "activityTextArea"));
                out.html("textFeedbackTextarea", text_area(doc, idevice, "answerTextArea"));
                Ok(out)
            }
            Self::CaseStudy => {
                let mut out = Extracted::new(CASE_STUDY, title);
                out.html("history", text_area(doc, idevice, "storyTextArea"));
                let activities = Query::new()
                    .field("questions")
                    .items()
                    .all(doc, idevice)
                    .into_iter()
                    .enumerate()
                    .map(|(i, question)| {
                        let activity = out.required(
                            format!("activities[{i}].activity"),
                            text_area(doc, question, "questionTextArea"),
                        );
                        let feedback = out.required(
                            format!("activities[{i}].feedback"),
                            text_area(doc, question, "feedbackTextArea"),
                        );
                        BTreeMap::from([
                            ("activity".to_string(), Payload::Html(activity)),
                            ("feedback".to_string(), Payload::Html(feedback)),
                        ])
                    })
                    .collect();
                out.fields.insert("activities".into(), Payload::List(activities));
                Ok(out)
            }
            Self::ImageGallery => {
                let mut out = Extracted::new(IMAGE_GALLERY, title);
                let images: Vec<_> = gallery_items(doc, idevice)
                    .into_iter()
                    .filter_map(|image| {
                        let storage_name = Query::new()
                            .field("_imageResource")
                            .first(doc, image)
                            .and_then(|r| doc.text(r, "_storageName"))?;
                        let caption = doc
                            .field(image, "_caption")
                            .and_then(|c| doc.scalar(c).or_else(|| doc.field_content(c)))
                            .unwrap_or_default();
                        Some(BTreeMap::from([
                            ("src".to_string(), Payload::Resource(format!("resources/{storage_name}"))),
                            ("caption".to_string(), Payload::Text(caption)),
                        ]))
                    })
                    .collect();
                if images.is_empty() {
                    return Err(Skip::NoPayload);
                }
                out.fields.insert("images".into(), Payload::List(images));
                Ok(out)
            }
            Self::Generic => {
                let texts = doc.text_fields(idevice);
                if texts.is_empty() {
                    return Err(Skip::NoPayload);
                }
                let mut out = Extracted::new(TEXT, title);
                let joined = texts.into_iter().map(|(_, t)| t).collect::<Vec<_>>().join("\n");
                out.html("textTextarea", Some(joined));
                Ok(out)
            }
        }
    }
}

fn text_area(doc: &LegacyDocument, node: NodeRef, key: &str) -> Option<String> {
    doc.field(node, key).and_then(|f| doc.field_content(f))
}

/// Gallery images are a plain list or a list-like instance wrapping one.
fn gallery_items(doc: &LegacyDocument, idevice: NodeRef) -> Vec<NodeRef> {
    let Some(images) = doc.field(idevice, "images") else {
        return Vec::new();
    };
    let direct = doc.items(images);
    if !direct.is_empty() {
        return direct;
    }
    ["list", ".listitems", "_images"]
        .into_iter()
        .find_map(|key| doc.field(images, key).map(|l| doc.items(l)))
        .unwrap_or_default()
}
