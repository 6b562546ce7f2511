//! Stand-off annotations in the eHOST (Knowtator XML) format.
//!
//! Every token carrying a `MENTION` label becomes one annotation with character offsets into the
//! untouched source text. Serialization failures never abort processing: the exporter logs them
//! and hands back the unwritten [Annotations].

use chrono::{Local, NaiveDateTime};
use fs_err as fs;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use xml::writer::{EmitterConfig, EventWriter, XmlEvent};

use crate::{types::Document, utils};

/// Annotator tag of generated mentions.
pub const SYSTEM_ANNOTATOR: &str = "SYSTEM";
const ANNOTATOR_ID: &str = "eHOST_2010";
const CREATION_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";
const ADJUDICATION_CHECKS: [&str; 5] = [
    "CHECK_OVERLAPPED_SPANS",
    "CHECK_ATTRIBUTES",
    "CHECK_RELATIONSHIP",
    "CHECK_CLASS",
    "CHECK_COMMENT",
];

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    Write(#[from] xml::writer::Error),
    #[error(transparent)]
    Parse(#[from] roxmltree::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("{field} of {id} contains a character which is not allowed in XML: {character:?}")]
    InvalidChar {
        id: String,
        field: &'static str,
        character: char,
    },
    #[error("malformed eHOST document: {0}")]
    Malformed(String),
}

/// One exported mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub id: String,
    pub annotator: String,
    pub class: String,
    pub comment: Option<String>,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset after the last character.
    pub end: usize,
    pub text: String,
}

/// Builds one record per token with a `MENTION` label, in document order.
pub fn mention_records(doc: &Document) -> Vec<MentionRecord> {
    doc.tokens()
        .iter()
        .enumerate()
        .filter_map(|(i, token)| doc.mention(i).map(|class| (token, class)))
        .enumerate()
        .map(|(n, (token, class))| MentionRecord {
            id: format!("EHOST_Instance_{}", n + 1),
            annotator: SYSTEM_ANNOTATOR.to_string(),
            class: class.to_string(),
            comment: None,
            start: token.idx(),
            end: token.end(),
            text: token.text().to_string(),
        })
        .collect()
}

fn write_text_element<W: Write>(
    writer: &mut EventWriter<W>,
    element: XmlEvent,
    text: &str,
) -> Result<(), Error> {
    writer.write(element)?;
    if !text.is_empty() {
        writer.write(XmlEvent::characters(text))?;
    }
    writer.write(XmlEvent::end_element())?;
    Ok(())
}

/// The content of one eHOST file.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotations {
    pub text_source: String,
    pub creation_date: String,
    pub records: Vec<MentionRecord>,
}

impl Annotations {
    pub fn new<S: Into<String>>(
        text_source: S,
        records: Vec<MentionRecord>,
        created: NaiveDateTime,
    ) -> Self {
        Annotations {
            text_source: text_source.into(),
            creation_date: created.format(CREATION_DATE_FORMAT).to_string(),
            records,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let check = |id: &str, field: &'static str, value: &str| -> Result<(), Error> {
            match value.chars().find(|c| !utils::is_xml_char(*c)) {
                Some(character) => Err(Error::InvalidChar {
                    id: id.to_string(),
                    field,
                    character,
                }),
                None => Ok(()),
            }
        };

        check("annotations", "textSource", &self.text_source)?;
        for record in &self.records {
            check(&record.id, "id", &record.id)?;
            check(&record.id, "class", &record.class)?;
            check(&record.id, "spannedText", &record.text)?;
            if let Some(comment) = &record.comment {
                check(&record.id, "annotationComment", comment)?;
            }
        }

        Ok(())
    }

    fn write_xml(&self) -> Result<String, Error> {
        let mut buffer = Vec::new();
        let mut writer = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("\t")
            .create_writer(&mut buffer);

        writer.write(XmlEvent::start_element("annotations").attr("textSource", &self.text_source))?;

        for record in &self.records {
            let start = record.start.to_string();
            let end = record.end.to_string();

            writer.write(XmlEvent::start_element("annotation"))?;
            writer.write(XmlEvent::start_element("mention").attr("id", &record.id))?;
            writer.write(XmlEvent::end_element())?;
            write_text_element(
                &mut writer,
                XmlEvent::start_element("annotator")
                    .attr("id", ANNOTATOR_ID)
                    .into(),
                &record.annotator,
            )?;
            write_text_element(
                &mut writer,
                XmlEvent::start_element("spannedText").into(),
                &record.text,
            )?;
            if let Some(comment) = &record.comment {
                write_text_element(
                    &mut writer,
                    XmlEvent::start_element("annotationComment").into(),
                    comment,
                )?;
            }
            write_text_element(
                &mut writer,
                XmlEvent::start_element("creationDate").into(),
                &self.creation_date,
            )?;
            writer.write(
                XmlEvent::start_element("span")
                    .attr("start", &start)
                    .attr("end", &end),
            )?;
            writer.write(XmlEvent::end_element())?;
            writer.write(XmlEvent::end_element())?;

            writer.write(XmlEvent::start_element("classMention").attr("id", &record.id))?;
            write_text_element(
                &mut writer,
                XmlEvent::start_element("mentionClass")
                    .attr("id", &record.class)
                    .into(),
                &record.text,
            )?;
            writer.write(XmlEvent::end_element())?;
        }

        writer.write(XmlEvent::start_element("eHOST_Adjudication_Status").attr("version", "1.0"))?;
        for selected in &[
            "Adjudication_Selected_Annotators",
            "Adjudication_Selected_Classes",
        ] {
            writer.write(XmlEvent::start_element(*selected).attr("version", "1.0"))?;
            writer.write(XmlEvent::end_element())?;
        }
        writer.write(XmlEvent::start_element("Adjudication_Others"))?;
        for check in &ADJUDICATION_CHECKS {
            write_text_element(&mut writer, XmlEvent::start_element(*check).into(), "false")?;
        }
        writer.write(XmlEvent::end_element())?;
        writer.write(XmlEvent::end_element())?;

        writer.write(XmlEvent::end_element())?;
        drop(writer);

        Ok(String::from_utf8(buffer)?)
    }

    /// Serializes the annotations and checks that the result parses as XML.
    pub fn to_xml(&self) -> Result<String, Error> {
        self.validate()?;
        let xml = self.write_xml()?;
        roxmltree::Document::parse(&xml)?;

        Ok(xml)
    }
}

/// The result of an export.
#[derive(Debug)]
pub enum Export {
    Written {
        xml: String,
        annotations: Annotations,
    },
    /// Serialization failed. The failure has been logged.
    Unwritten {
        annotations: Annotations,
        error: Error,
    },
}

impl Export {
    pub fn annotations(&self) -> &Annotations {
        match self {
            Export::Written { annotations, .. } => annotations,
            Export::Unwritten { annotations, .. } => annotations,
        }
    }

    pub fn xml(&self) -> Option<&str> {
        match self {
            Export::Written { xml, .. } => Some(xml),
            Export::Unwritten { .. } => None,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Export::Written { .. })
    }
}

/// Serializes mention records to eHOST XML.
#[derive(Debug, Clone, Default)]
pub struct StandoffExporter {
    error_log: Option<PathBuf>,
}

impl StandoffExporter {
    pub fn new() -> Self {
        StandoffExporter::default()
    }

    /// Failures are additionally appended to the file at `path`.
    pub fn with_error_log<P: Into<PathBuf>>(path: P) -> Self {
        StandoffExporter {
            error_log: Some(path.into()),
        }
    }

    /// Exports the records with the current local time as creation date.
    pub fn export<S: Into<String>>(&self, text_source: S, records: Vec<MentionRecord>) -> Export {
        self.export_at(text_source, records, Local::now().naive_local())
    }

    pub fn export_at<S: Into<String>>(
        &self,
        text_source: S,
        records: Vec<MentionRecord>,
        created: NaiveDateTime,
    ) -> Export {
        let annotations = Annotations::new(text_source, records, created);

        match annotations.to_xml() {
            Ok(xml) => Export::Written { xml, annotations },
            Err(error) => {
                error!(
                    "unable to create XML for {}: {}",
                    annotations.text_source, error
                );
                self.log_failure(&annotations.text_source, &error);

                Export::Unwritten { annotations, error }
            }
        }
    }

    fn log_failure(&self, text_source: &str, failure: &Error) {
        let path = match &self.error_log {
            Some(path) => path,
            None => return,
        };

        if let Err(log_error) = append_failure(path, text_source, failure) {
            error!("unable to append to error log: {}", log_error);
        }
    }
}

fn append_failure(path: &Path, text_source: &str, failure: &Error) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    writeln!(
        file,
        "Unable to create XML file: {} {}",
        text_source, failure
    )
}

/// Writes `<name>.knowtator.xml` into `dir`, creating the directory if needed.
pub fn write<P: AsRef<Path>>(dir: P, name: &str, xml: &str) -> Result<PathBuf, crate::Error> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let path = dir.join(format!("{}.knowtator.xml", name));
    fs::write(&path, xml)?;
    info!("wrote {}", path.display());

    Ok(path)
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|x| x.is_element() && x.tag_name().name() == name)
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).map(|x| x.text().unwrap_or(""))
}

/// Parses an eHOST document back into [Annotations].
pub fn read_annotations(xml: &str) -> Result<Annotations, Error> {
    let document = roxmltree::Document::parse(xml)?;
    let root = document.root_element();

    if root.tag_name().name() != "annotations" {
        return Err(Error::Malformed(format!(
            "unexpected root element {}",
            root.tag_name().name()
        )));
    }

    let classes: HashMap<&str, &str> = root
        .children()
        .filter(|x| x.is_element() && x.tag_name().name() == "classMention")
        .filter_map(|x| {
            let class = child(x, "mentionClass")?.attribute("id")?;
            Some((x.attribute("id")?, class))
        })
        .collect();

    let mut creation_date = String::new();
    let mut records = Vec::new();

    for annotation in root
        .children()
        .filter(|x| x.is_element() && x.tag_name().name() == "annotation")
    {
        let id = child(annotation, "mention")
            .and_then(|x| x.attribute("id"))
            .ok_or_else(|| Error::Malformed("annotation without mention id".into()))?;
        let span = child(annotation, "span")
            .ok_or_else(|| Error::Malformed(format!("{} has no span", id)))?;
        let offset = |name: &str| -> Result<usize, Error> {
            span.attribute(name)
                .and_then(|x| x.parse().ok())
                .ok_or_else(|| Error::Malformed(format!("{} has an invalid span {}", id, name)))
        };

        if creation_date.is_empty() {
            creation_date = child_text(annotation, "creationDate")
                .unwrap_or("")
                .to_string();
        }

        records.push(MentionRecord {
            id: id.to_string(),
            annotator: child_text(annotation, "annotator")
                .unwrap_or("")
                .to_string(),
            class: classes
                .get(id)
                .ok_or_else(|| Error::Malformed(format!("{} has no class mention", id)))?
                .to_string(),
            comment: child_text(annotation, "annotationComment").map(|x| x.to_string()),
            start: offset("start")?,
            end: offset("end")?,
            text: child_text(annotation, "spannedText")
                .unwrap_or("")
                .to_string(),
        });
    }

    Ok(Annotations {
        text_source: root.attribute("textSource").unwrap_or("").to_string(),
        creation_date,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::Schema,
        types::{TokenInput, Value},
    };
    use chrono::NaiveDate;

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 3, 14)
            .and_then(|x| x.and_hms_opt(9, 26, 53))
            .unwrap()
    }

    fn record(n: usize, class: &str, start: usize, text: &str) -> MentionRecord {
        MentionRecord {
            id: format!("EHOST_Instance_{}", n),
            annotator: SYSTEM_ANNOTATOR.to_string(),
            class: class.to_string(),
            comment: None,
            start,
            end: start + text.chars().count(),
            text: text.to_string(),
        }
    }

    #[test]
    fn one_record_per_mention_token() {
        let mut schema = Schema::new();
        let label = Value::Label(schema.intern_label("SOCIAL_MEDIA"));
        let inputs = vec![
            TokenInput::new("She", "she", "PRON", "PRP", 0, true),
            TokenInput::new("uses", "use", "VERB", "VBZ", 4, true),
            TokenInput::new("Facebook", "facebook", "PROPN", "NNP", 9, true),
            TokenInput::new("and", "and", "CCONJ", "CC", 18, true),
            TokenInput::new("Twitter", "twitter", "PROPN", "NNP", 22, false),
        ];
        let mut doc = Document::new(inputs, &schema);
        doc.set_span(2, 3, schema.mention(), label).unwrap();
        doc.set_span(4, 5, schema.mention(), label).unwrap();

        assert_eq!(
            mention_records(&doc),
            vec![
                record(1, "SOCIAL_MEDIA", 9, "Facebook"),
                record(2, "SOCIAL_MEDIA", 22, "Twitter")
            ]
        );
    }

    #[test]
    fn writes_ehost_structure() {
        let export = StandoffExporter::new().export_at(
            "note_1.txt",
            vec![record(1, "SOCIAL_MEDIA", 9, "Facebook")],
            created(),
        );

        let xml = export.xml().unwrap();
        let document = roxmltree::Document::parse(xml).unwrap();
        let root = document.root_element();

        assert_eq!(root.attribute("textSource"), Some("note_1.txt"));
        assert!(xml.contains("<annotator id=\"eHOST_2010\">SYSTEM</annotator>"));
        assert!(xml.contains("<creationDate>Thu Mar 14 09:26:53 2019</creationDate>"));
        assert!(xml.contains("<span start=\"9\" end=\"17\""));
        assert!(xml.contains("<mentionClass id=\"SOCIAL_MEDIA\">Facebook</mentionClass>"));

        let checks: Vec<_> = root
            .descendants()
            .filter(|x| x.tag_name().name().starts_with("CHECK_"))
            .map(|x| (x.tag_name().name(), x.text()))
            .collect();
        assert_eq!(checks.len(), 5);
        assert!(checks.iter().all(|(_, text)| *text == Some("false")));
    }

    #[test]
    fn roundtrips_records() {
        let records = vec![
            record(1, "SOCIAL_MEDIA", 9, "#selfcare"),
            record(2, "INTERNET", 30, "R&D <site>"),
        ];
        let export = StandoffExporter::new().export_at("note.txt", records.clone(), created());

        let annotations = read_annotations(export.xml().unwrap()).unwrap();
        assert_eq!(annotations.records, records);
        assert_eq!(annotations.text_source, "note.txt");
        assert_eq!(annotations.creation_date, "Thu Mar 14 09:26:53 2019");
    }

    #[test]
    fn failure_is_logged_and_returned() {
        let log = std::env::temp_dir().join(format!(
            "mentionrule-export-{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&log);

        let export = StandoffExporter::with_error_log(&log).export_at(
            "bad.txt",
            vec![record(1, "SOCIAL_MEDIA", 0, "bad\u{1}text")],
            created(),
        );

        match &export {
            Export::Unwritten { annotations, error } => {
                assert_eq!(annotations.records.len(), 1);
                assert!(matches!(error, Error::InvalidChar { .. }));
            }
            Export::Written { .. } => panic!("export must fail"),
        }

        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.starts_with("Unable to create XML file: bad.txt"));
        std::fs::remove_file(&log).unwrap();
    }

    #[test]
    fn log_errors_name_the_file() {
        let log = std::env::temp_dir()
            .join(format!("mentionrule-missing-{}", std::process::id()))
            .join("export.log");

        let error = append_failure(&log, "bad.txt", &Error::Malformed("test".into()))
            .unwrap_err();
        assert!(error.to_string().contains(&log.display().to_string()));
    }
}
