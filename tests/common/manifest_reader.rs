//! Reads a generated signing project back with an XML parser.
//!
//! Panics on malformed XML, so every caller also checks well-formedness.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedItem {
    pub include: String,
    pub authenticode: String,
    pub strong_name: String,
}

#[derive(Debug, Default)]
pub struct ParsedManifest {
    pub namespace: Option<String>,
    pub imports: Vec<String>,
    pub item_groups: usize,
    pub items: Vec<ParsedItem>,
    pub target: Option<String>,
    pub sign_files: BTreeMap<String, String>,
}

impl ParsedManifest {
    pub fn includes(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.include.as_str()).collect()
    }
}

pub fn parse_manifest(xml: &str) -> ParsedManifest {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut parsed = ParsedManifest::default();
    let mut open: Vec<String> = Vec::new();

    loop {
        match reader.read_event().expect("manifest must be well-formed XML") {
            Event::Start(e) => {
                let name = record_element(&mut parsed, &open, &e);
                open.push(name);
            }
            Event::Empty(e) => {
                record_element(&mut parsed, &open, &e);
            }
            Event::End(_) => {
                open.pop();
            }
            Event::Text(t) => {
                let text = t.unescape().expect("valid text").into_owned();
                let item = parsed.items.last_mut();
                match (open.last().map(String::as_str), item) {
                    (Some("Authenticode"), Some(item)) => item.authenticode = text,
                    (Some("StrongName"), Some(item)) => item.strong_name = text,
                    (element, _) => panic!("unexpected text {text:?} in {element:?}"),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    assert!(open.is_empty(), "unclosed elements: {open:?}");
    parsed
}

fn record_element(parsed: &mut ParsedManifest, open: &[String], e: &BytesStart) -> String {
    let name = String::from_utf8(e.name().as_ref().to_vec()).expect("UTF-8 element name");
    let attrs: BTreeMap<String, String> = e
        .attributes()
        .map(|a| {
            let a = a.expect("valid attribute");
            (
                String::from_utf8(a.key.as_ref().to_vec()).expect("UTF-8 attribute name"),
                a.unescape_value().expect("valid attribute value").into_owned(),
            )
        })
        .collect();
    let parent = open.last().map(String::as_str);

    match name.as_str() {
        "Project" => parsed.namespace = attrs.get("xmlns").cloned(),
        "Import" => {
            assert_eq!(parent, Some("Project"));
            parsed.imports.push(attrs["Project"].clone());
        }
        "ItemGroup" => parsed.item_groups += 1,
        "FilesToSign" => {
            assert_eq!(parent, Some("ItemGroup"));
            parsed.items.push(ParsedItem {
                include: attrs["Include"].clone(),
                ..ParsedItem::default()
            });
        }
        "Target" => parsed.target = attrs.get("Name").cloned(),
        "SignFiles" => {
            assert_eq!(parent, Some("Target"));
            parsed.sign_files = attrs;
        }
        _ => {}
    }
    name
}
