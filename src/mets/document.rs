//! Typed accessor layer over a parsed METS/MODS tree.
//!
//! Every query the extractor and resolver need is a named method here, so
//! callers never touch element names or namespaces directly.

use roxmltree::{Document, Node};
use thiserror::Error;

pub const METS_NS: &str = "http://www.loc.gov/METS/";
pub const MODS_NS: &str = "http://www.loc.gov/mods/v3";
pub const DV_NS: &str = "http://dfg-viewer.de/";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetsError {
    #[error("document contains no METS namespace root")]
    MalformedDocument,
}

/// A file reference from the METS file section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    pub url: String,
    pub mimetype: Option<String>,
}

/// A page entry from the physical structure map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalPage {
    pub id: String,
    pub order: Option<i64>,
    pub label: Option<String>,
    pub order_label: Option<String>,
    pub file_ids: Vec<String>,
}

/// A division from the logical structure map, nested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalDivision {
    pub id: Option<String>,
    pub label: Option<String>,
    pub division_type: Option<String>,
    pub children: Vec<LogicalDivision>,
}

/// The pieces a MODS title is assembled from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleParts {
    pub title: Option<String>,
    pub non_sort: Option<String>,
    pub sub_title: Option<String>,
}

#[derive(Debug)]
pub struct MetsDocument<'a, 'input> {
    mets: Node<'a, 'input>,
}

impl<'a, 'input: 'a> MetsDocument<'a, 'input> {
    /// Wrap a parsed tree, locating the `mets:mets` root. The root may be
    /// nested inside an envelope (OAI responses wrap it that way).
    pub fn new(doc: &'a Document<'input>) -> Result<Self, MetsError> {
        let mets = doc
            .root()
            .descendants()
            .find(|n| n.has_tag_name((METS_NS, "mets")))
            .ok_or(MetsError::MalformedDocument)?;
        Ok(Self { mets })
    }

    fn elements(
        &self,
        ns: &'static str,
        local: &'static str,
    ) -> impl Iterator<Item = Node<'a, 'input>> + '_ {
        self.mets
            .descendants()
            .filter(move |n| n.has_tag_name((ns, local)))
    }

    fn first_text(&self, ns: &'static str, local: &'static str) -> Option<String> {
        self.elements(ns, local)
            .find_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// All file references with a resolvable URL location
    pub fn file_entries(&self) -> Vec<FileEntry> {
        self.elements(METS_NS, "file")
            .filter_map(|file| {
                let id = file.attribute("ID")?.to_string();
                let url = file
                    .children()
                    .find(|c| c.has_tag_name((METS_NS, "FLocat")))
                    .and_then(|loc| loc.attribute((XLINK_NS, "href")))?
                    .to_string();
                Some(FileEntry {
                    id,
                    url,
                    mimetype: file.attribute("MIMETYPE").map(str::to_string),
                })
            })
            .collect()
    }

    /// File URLs filtered by MIME type, in file-section order
    pub fn file_urls_by_mimetype(&self, mimetype: &str) -> Vec<String> {
        self.file_entries()
            .into_iter()
            .filter(|f| f.mimetype.as_deref() == Some(mimetype))
            .map(|f| f.url)
            .collect()
    }

    fn struct_map(&self, map_type: &str) -> Option<Node<'a, 'input>> {
        self.elements(METS_NS, "structMap")
            .find(|n| n.attribute("TYPE") == Some(map_type))
    }

    /// Page divisions of the physical structure map, in occurrence order.
    /// Nested groupings are tolerated; only `TYPE="page"` divisions count.
    pub fn physical_pages(&self) -> Vec<PhysicalPage> {
        let Some(map) = self.struct_map("PHYSICAL") else {
            return Vec::new();
        };
        map.descendants()
            .filter(|n| {
                n.has_tag_name((METS_NS, "div")) && n.attribute("TYPE") == Some("page")
            })
            .filter_map(|div| {
                let id = div.attribute("ID")?.to_string();
                let file_ids = div
                    .descendants()
                    .filter(|c| c.has_tag_name((METS_NS, "fptr")))
                    .filter_map(|c| c.attribute("FILEID"))
                    .map(str::to_string)
                    .collect();
                Some(PhysicalPage {
                    id,
                    order: div.attribute("ORDER").and_then(|o| o.parse().ok()),
                    label: div.attribute("LABEL").map(str::to_string),
                    order_label: div.attribute("ORDERLABEL").map(str::to_string),
                    file_ids,
                })
            })
            .collect()
    }

    /// Top-level divisions of the logical structure map, nested
    pub fn logical_divisions(&self) -> Vec<LogicalDivision> {
        let Some(map) = self.struct_map("LOGICAL") else {
            return Vec::new();
        };
        map.children()
            .filter(|n| n.has_tag_name((METS_NS, "div")))
            .map(|div| Self::division(div))
            .collect()
    }

    fn division(node: Node<'a, 'input>) -> LogicalDivision {
        LogicalDivision {
            id: node.attribute("ID").map(str::to_string),
            label: node.attribute("LABEL").map(str::to_string),
            division_type: node.attribute("TYPE").map(str::to_string),
            children: node
                .children()
                .filter(|n| n.has_tag_name((METS_NS, "div")))
                .map(|div| Self::division(div))
                .collect(),
        }
    }

    /// `structLink` mappings from logical to physical IDs
    pub fn struct_links(&self) -> Vec<(String, String)> {
        self.elements(METS_NS, "smLink")
            .filter_map(|link| {
                let from = link.attribute((XLINK_NS, "from"))?;
                let to = link.attribute((XLINK_NS, "to"))?;
                Some((from.to_string(), to.to_string()))
            })
            .collect()
    }

    /// Title entries that belong to the document itself: direct `titleInfo`
    /// children of the first descriptive section's `mods:mods`
    pub fn title_infos(&self) -> Vec<TitleParts> {
        let Some(dmd) = self.elements(METS_NS, "dmdSec").next() else {
            return Vec::new();
        };
        dmd.descendants()
            .filter(|n| n.has_tag_name((MODS_NS, "mods")))
            .flat_map(|mods| {
                mods.children()
                    .filter(|n| n.has_tag_name((MODS_NS, "titleInfo")))
            })
            .map(|info| Self::title_parts(info))
            .collect()
    }

    /// Title of the containing multi-volume work, if any
    pub fn host_title(&self) -> Option<TitleParts> {
        self.elements(MODS_NS, "relatedItem")
            .filter(|n| n.attribute("type") == Some("host"))
            .flat_map(|item| {
                item.descendants()
                    .filter(|n| n.has_tag_name((MODS_NS, "titleInfo")))
            })
            .map(|info| Self::title_parts(info))
            .next()
    }

    fn title_parts(info: Node<'a, 'input>) -> TitleParts {
        let text_of = |local: &str| {
            info.children()
                .find(|n| n.has_tag_name((MODS_NS, local)))
                .and_then(|n| n.text())
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        };
        TitleParts {
            title: text_of("title"),
            non_sort: text_of("nonSort"),
            sub_title: text_of("subTitle"),
        }
    }

    /// Part number for items of a multi-volume work
    pub fn part_number(&self) -> Option<String> {
        self.elements(MODS_NS, "part")
            .flat_map(|part| {
                part.descendants()
                    .filter(|n| n.has_tag_name((MODS_NS, "number")))
            })
            .find_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// All `(type, value)` identifier pairs from the descriptive metadata
    pub fn identifiers(&self) -> Vec<(String, String)> {
        self.elements(MODS_NS, "identifier")
            .filter_map(|id| {
                let value = id.text()?.trim();
                if value.is_empty() {
                    return None;
                }
                let id_type = id.attribute("type").unwrap_or("unknown");
                Some((id_type.to_string(), value.to_string()))
            })
            .collect()
    }

    /// Names with an `aut` role, one string per `namePart`
    pub fn creators(&self) -> Vec<String> {
        self.elements(MODS_NS, "name")
            .filter(|name| {
                name.descendants()
                    .filter(|n| n.has_tag_name((MODS_NS, "roleTerm")))
                    .any(|n| n.text().map(str::trim) == Some("aut"))
            })
            .flat_map(|name| {
                name.children()
                    .filter(|n| n.has_tag_name((MODS_NS, "namePart")))
                    .filter_map(|n| n.text())
                    .map(|t| t.trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn rights_section(&self) -> Option<Node<'a, 'input>> {
        self.elements(METS_NS, "rightsMD").next()
    }

    fn rights_text(&self, local: &'static str) -> Option<String> {
        self.rights_section()?
            .descendants()
            .filter(|n| n.has_tag_name((DV_NS, local)))
            .find_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    pub fn rights_owner(&self) -> Option<String> {
        self.rights_text("owner")
    }

    pub fn rights_owner_logo(&self) -> Option<String> {
        self.rights_text("ownerLogo")
    }

    pub fn rights_owner_site(&self) -> Option<String> {
        self.rights_text("ownerSiteURL")
    }

    pub fn license(&self) -> Option<String> {
        self.rights_text("license")
    }

    pub fn language(&self) -> Option<String> {
        self.elements(MODS_NS, "languageTerm")
            .filter(|n| n.attribute("type") == Some("text"))
            .find_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    pub fn genre(&self) -> Option<String> {
        self.first_text(MODS_NS, "genre")
    }

    pub fn description(&self) -> Option<String> {
        self.first_text(MODS_NS, "abstract")
    }

    /// Viewer presentation link from the provenance section
    pub fn presentation_url(&self) -> Option<String> {
        self.elements(METS_NS, "digiprovMD")
            .next()?
            .descendants()
            .filter(|n| n.has_tag_name((DV_NS, "presentation")))
            .find_map(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// PDF rendition from the download file group, if present
    pub fn pdf_download_url(&self) -> Option<String> {
        self.elements(METS_NS, "fileGrp")
            .filter(|grp| grp.attribute("USE") == Some("DOWNLOAD"))
            .flat_map(|grp| {
                grp.children().filter(|n| {
                    n.has_tag_name((METS_NS, "file"))
                        && n.attribute("MIMETYPE") == Some("application/pdf")
                })
            })
            .find_map(|file| {
                file.children()
                    .find(|c| c.has_tag_name((METS_NS, "FLocat")))
                    .and_then(|loc| loc.attribute((XLINK_NS, "href")))
                    .map(str::to_string)
            })
    }
}
