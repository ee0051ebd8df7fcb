//! Element-tree view of existing Mule configuration documents.
//!
//! Only what reconciliation needs is kept: element names with their resolved
//! namespace, attributes in document order and child elements. Text, comments
//! and processing instructions are dropped.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tokio::fs;

use crate::{Error, Result};

pub const MULE_CORE_NS: &str = "http://www.mulesoft.org/schema/mule/core";
pub const HTTP_NS: &str = "http://www.mulesoft.org/schema/mule/http";
pub const APIKIT_NS: &str = "http://www.mulesoft.org/schema/mule/mule-apikit";
pub const LEGACY_APIKIT_NS: &str = "http://www.mulesoft.org/schema/mule/apikit";

/// The element kinds reconciliation looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    ApikitConfig,
    ApikitRouter,
    ListenerConfig,
    ListenerConnection,
    Listener,
    InboundEndpoint,
    Flow,
}

impl ElementKind {
    fn local_name(&self) -> &'static str {
        match self {
            Self::ApikitConfig => "config",
            Self::ApikitRouter => "router",
            Self::ListenerConfig => "listener-config",
            Self::ListenerConnection => "listener-connection",
            Self::Listener => "listener",
            Self::InboundEndpoint => "inbound-endpoint",
            Self::Flow => "flow",
        }
    }

    fn accepts_namespace(&self, namespace: Option<&str>) -> bool {
        match self {
            Self::ApikitConfig | Self::ApikitRouter => {
                matches!(namespace, Some(APIKIT_NS) | Some(LEGACY_APIKIT_NS))
            }
            Self::ListenerConfig | Self::ListenerConnection | Self::Listener | Self::InboundEndpoint => {
                namespace == Some(HTTP_NS)
            }
            Self::Flow => matches!(namespace, None | Some(MULE_CORE_NS)),
        }
    }

    pub fn matches(&self, element: &Element) -> bool {
        element.local_name == self.local_name() && self.accepts_namespace(element.namespace.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    /// Attributes other than namespace declarations
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is(&self, kind: ElementKind) -> bool {
        kind.matches(self)
    }

    /// This element and all its descendants, depth-first in document order
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(el) = stack.pop() {
            out.push(el);
            stack.extend(el.children.iter().rev());
        }
        out
    }

    pub fn find_all(&self, kind: ElementKind) -> Vec<&Element> {
        self.descendants()
            .into_iter()
            .filter(|el| el.is(kind))
            .collect()
    }

    pub fn first_child(&self) -> Option<&Element> {
        self.children.first()
    }

    pub fn child(&self, kind: ElementKind) -> Option<&Element> {
        self.children.iter().find(|el| el.is(kind))
    }
}

/// A parsed configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    /// Path the document was read from, used as its identity
    pub path: String,
    pub root: Element,
}

impl ConfigDocument {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        Self::parse(path.to_string_lossy(), &content)
    }

    pub fn parse(path: impl Into<String>, content: &str) -> Result<Self> {
        let path = path.into();
        let root = parse_element_tree(content)?
            .ok_or_else(|| Error::structural(format!("{} has no root element", path)))?;
        Ok(Self { path, root })
    }

    /// Every element of `kind` in the document
    pub fn find_all(&self, kind: ElementKind) -> Vec<&Element> {
        self.root.find_all(kind)
    }

    /// Every APIKit router together with the flow that encloses it
    pub fn routers(&self) -> Vec<(&Element, Option<&Element>)> {
        fn go<'a>(
            el: &'a Element,
            flow: Option<&'a Element>,
            out: &mut Vec<(&'a Element, Option<&'a Element>)>,
        ) {
            let flow = if el.is(ElementKind::Flow) { Some(el) } else { flow };
            if el.is(ElementKind::ApikitRouter) {
                out.push((el, flow));
            }
            for child in &el.children {
                go(child, flow, out);
            }
        }
        let mut out = Vec::new();
        go(&self.root, None, &mut out);
        out
    }
}

type Scope = HashMap<Option<String>, String>;

fn parse_element_tree(content: &str) -> Result<Option<Element>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<(Element, Scope)> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let parent = stack.last().map(|(_, scope)| scope);
                let (element, scope) = open_element(&start, parent)?;
                stack.push((element, scope));
            }
            Event::Empty(start) => {
                let parent = stack.last().map(|(_, scope)| scope);
                let (element, _) = open_element(&start, parent)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                if let Some((element, _)) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::structural("unexpected end of document"));
    }
    Ok(root)
}

fn attach(stack: &mut [(Element, Scope)], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some((parent, _)) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn open_element(start: &BytesStart<'_>, parent: Option<&Scope>) -> Result<(Element, Scope)> {
    let mut scope = parent.cloned().unwrap_or_default();
    let mut attributes = IndexMap::new();

    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        if key == "xmlns" {
            scope.insert(None, value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.insert(Some(prefix.to_string()), value);
        } else {
            attributes.insert(key, value);
        }
    }

    let qualified = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let (prefix, local_name) = match qualified.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, qualified),
    };
    let namespace = scope.get(&prefix).cloned();

    Ok((
        Element {
            prefix,
            local_name,
            namespace,
            attributes,
            children: Vec::new(),
        },
        scope,
    ))
}
