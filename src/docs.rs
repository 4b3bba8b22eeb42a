//! OpenAPI document generation.
//!
//! Operations are tagged by their group and enriched with human-authored text
//! from an optional `<crate-name>.xml` file in the .NET doc-comment layout:
//!
//! ```xml
//! <doc>
//!   <members>
//!     <member name="M:format_number"><summary>Formats a number.</summary></member>
//!     <member name="T:Localization"><summary>Culture-aware endpoints.</summary></member>
//!   </members>
//! </doc>
//! ```

use crate::error::StartupError;
use crate::types::{
    CultureInfo, CultureList, FormattedNumber, HealthChecks, HealthStatus, LocalizedString,
    MetricsResponse, NumberFormatInfo,
};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use utoipa::openapi::path::{Operation, PathItem};
use utoipa::openapi::tag::TagBuilder;
use utoipa::OpenApi;

pub const API_TITLE: &str = "Maps API";
pub const API_VERSION: &str = "v1";
/// Group for operations declared without a tag.
pub const DEFAULT_GROUP: &str = "Default";

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::format_number,
        crate::handlers::list_cultures,
        crate::handlers::localized_string,
        crate::observability::health_handler,
        crate::observability::metrics_handler,
    ),
    components(schemas(
        FormattedNumber,
        CultureList,
        CultureInfo,
        NumberFormatInfo,
        LocalizedString,
        HealthStatus,
        HealthChecks,
        MetricsResponse
    ))
)]
pub struct ApiDoc;

/// Name of the doc-comment sidecar file.
pub fn comments_file_name() -> String {
    format!("{}.xml", env!("CARGO_PKG_NAME"))
}

/// Directory of the running executable.
pub fn executable_dir() -> Result<PathBuf, StartupError> {
    let exe = std::env::current_exe().map_err(StartupError::ExecutableDir)?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

#[derive(Error, Debug)]
pub enum DocCommentsError {
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error("unexpected end of file inside <{0}>")]
    Unclosed(String),
}

impl From<AttrError> for DocCommentsError {
    fn from(err: AttrError) -> Self {
        DocCommentsError::Xml(err.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Remarks,
}

impl Section {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "summary" => Some(Section::Summary),
            "remarks" => Some(Section::Remarks),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Section::Summary => "summary",
            Section::Remarks => "remarks",
        }
    }
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Result<Option<String>, DocCommentsError> {
    Ok(match element.try_get_attribute(key)? {
        Some(attr) => Some(attr.unescape_value()?.into_owned()),
        None => None,
    })
}

/// Text standing in for a self-closing reference such as `<see cref="..."/>`.
fn inline_reference(element: &BytesStart<'_>) -> Result<Option<String>, DocCommentsError> {
    if let Some(cref) = attribute(element, "cref")? {
        return Ok(Some(short_name(&cref).to_string()));
    }
    if let Some(word) = attribute(element, "langword")? {
        return Ok(Some(word));
    }
    attribute(element, "name")
}

/// `M:Maps.Api.Handlers.Format(System.Double)` -> `Format`
fn short_name(cref: &str) -> &str {
    let without_kind = cref.split_once(':').map_or(cref, |(_, rest)| rest);
    let without_args = without_kind.split('(').next().unwrap_or(without_kind);
    without_args.rsplit('.').next().unwrap_or(without_args)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDoc {
    pub summary: Option<String>,
    pub remarks: Option<String>,
}

/// Parsed doc comments keyed by member name (`M:<operation id>`, `T:<group>`).
#[derive(Debug, Clone, Default)]
pub struct XmlComments {
    members: HashMap<String, MemberDoc>,
}

impl XmlComments {
    /// Inline elements inside `<summary>`/`<remarks>` are flattened to text:
    /// `<see cref="T:Ns.Culture"/>` becomes `Culture`, `<paramref name="x"/>`
    /// becomes `x`, and `<c>`/`<para>` keep their content.
    pub fn parse(xml: &str) -> Result<Self, DocCommentsError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut members = HashMap::new();
        let mut open: Vec<String> = Vec::new();
        let mut member: Option<(String, MemberDoc)> = None;
        let mut section: Option<Section> = None;
        let mut text = String::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if section.is_some() {
                        if name == "para" {
                            text.push(' ');
                        }
                    } else if name == "member" {
                        let member_name = attribute(&e, "name")?.unwrap_or_default();
                        member = Some((member_name, MemberDoc::default()));
                    } else if member.is_some() {
                        section = Section::from_tag(&name);
                        text.clear();
                    }
                    open.push(name);
                }
                Event::Empty(e) => {
                    if section.is_some() {
                        if let Some(reference) = inline_reference(&e)? {
                            text.push_str(&reference);
                        }
                    }
                }
                Event::Text(t) => {
                    if section.is_some() {
                        text.push_str(&t.unescape()?);
                    }
                }
                Event::CData(c) => {
                    if section.is_some() {
                        text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(e) => {
                    open.pop();
                    let local = e.local_name();
                    let name = local.as_ref();
                    if let Some(kind) = section {
                        if kind.tag().as_bytes() == name {
                            let value = normalise(&text);
                            if let Some((_, doc)) = member.as_mut() {
                                match kind {
                                    Section::Summary => doc.summary = value,
                                    Section::Remarks => doc.remarks = value,
                                }
                            }
                            section = None;
                        } else if name == b"para" {
                            text.push(' ');
                        }
                    } else if name == b"member" {
                        if let Some((member_name, doc)) = member.take() {
                            members.insert(member_name, doc);
                        }
                    }
                }
                Event::Eof => {
                    if let Some(unclosed) = open.pop() {
                        return Err(DocCommentsError::Unclosed(unclosed));
                    }
                    break;
                }
                _ => {}
            }
        }

        Ok(Self { members })
    }

    /// Reads `<dir>/<crate-name>.xml`. A missing file is not an error.
    pub fn load_optional(dir: &Path) -> Result<Option<Self>, StartupError> {
        let path = dir.join(comments_file_name());
        if !path.is_file() {
            warn!(
                "No doc comments at {}, API description will lack them",
                path.display()
            );
            return Ok(None);
        }

        let xml = std::fs::read_to_string(&path).map_err(|source| {
            StartupError::DocCommentsRead {
                path: path.clone(),
                source,
            }
        })?;
        let comments = Self::parse(&xml).map_err(|source| StartupError::DocCommentsParse {
            path: path.clone(),
            source,
        })?;
        info!(
            "Loaded {} doc comment members from {}",
            comments.members.len(),
            path.display()
        );
        Ok(Some(comments))
    }

    pub fn operation(&self, operation_id: &str) -> Option<&MemberDoc> {
        self.members.get(&format!("M:{operation_id}"))
    }

    pub fn group(&self, group: &str) -> Option<&MemberDoc> {
        self.members.get(&format!("T:{group}"))
    }

    /// Fills summary and description only where the annotation left them empty.
    fn apply_to_operation(&self, operation: &mut Operation) {
        let Some(doc) = operation
            .operation_id
            .as_deref()
            .and_then(|id| self.operation(id))
        else {
            return;
        };
        if operation.summary.is_none() {
            operation.summary = doc.summary.clone();
        }
        if operation.description.is_none() {
            operation.description = doc.remarks.clone();
        }
    }
}

fn normalise(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn operations_mut(item: &mut PathItem) -> impl Iterator<Item = &mut Operation> {
    [
        &mut item.get,
        &mut item.put,
        &mut item.post,
        &mut item.delete,
        &mut item.options,
        &mut item.head,
        &mut item.patch,
        &mut item.trace,
    ]
    .into_iter()
    .filter_map(Option::as_mut)
}

pub struct ApiDocs;

impl ApiDocs {
    /// Builds the `v1` document. Every discovered operation is included.
    pub fn generate(comments: Option<&XmlComments>) -> utoipa::openapi::OpenApi {
        let mut openapi = ApiDoc::openapi();
        openapi.info.title = API_TITLE.to_string();
        openapi.info.version = API_VERSION.to_string();

        let mut groups = BTreeSet::new();
        for item in openapi.paths.paths.values_mut() {
            for operation in operations_mut(item) {
                let group = operation
                    .tags
                    .as_ref()
                    .and_then(|tags| tags.first().cloned())
                    .unwrap_or_else(|| DEFAULT_GROUP.to_string());
                operation.tags = Some(vec![group.clone()]);
                groups.insert(group);

                if let Some(comments) = comments {
                    comments.apply_to_operation(operation);
                }
            }
        }

        openapi.tags = Some(
            groups
                .into_iter()
                .map(|group| {
                    let description = comments
                        .and_then(|c| c.group(&group))
                        .and_then(|doc| doc.summary.clone());
                    TagBuilder::new().name(group).description(description).build()
                })
                .collect(),
        );
        openapi
    }
}
