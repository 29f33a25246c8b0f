//! METS/MODS document access
//!
//! [`MetsDocument`] wraps a parsed XML tree behind typed accessors so the
//! metadata extractor and structure resolver never issue raw path queries
//! themselves. [`metadata::extract`] derives bibliographic metadata,
//! [`structure::resolve_pages`] and [`structure::toc_entries`] derive the
//! physical reading order and the logical table of contents.

pub mod document;
pub mod metadata;
pub mod structure;

pub use document::{MetsDocument, MetsError};
pub use metadata::{Attribution, DocumentMetadata, SeeAlsoRef};
pub use structure::{Page, PageImage, TocEntry};

/// A small but structurally complete METS/MODS document used across the
/// unit tests of this module: three JPEG pages (declared out of reading
/// order), one page without a resolvable image, a two-level logical
/// structure and the usual rights/provenance sections.
#[cfg(test)]
pub(crate) const SAMPLE_METS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mets:mets xmlns:mets="http://www.loc.gov/METS/"
           xmlns:mods="http://www.loc.gov/mods/v3"
           xmlns:dv="http://dfg-viewer.de/"
           xmlns:xlink="http://www.w3.org/1999/xlink">
  <mets:dmdSec ID="dmd001">
    <mets:mdWrap MDTYPE="MODS">
      <mets:xmlData>
        <mods:mods>
          <mods:titleInfo>
            <mods:nonSort>Die</mods:nonSort>
            <mods:title>Historische Drucke</mods:title>
            <mods:subTitle>Eine Auswahl</mods:subTitle>
          </mods:titleInfo>
          <mods:name>
            <mods:role><mods:roleTerm>aut</mods:roleTerm></mods:role>
            <mods:namePart>Dilherr, Johann Michael</mods:namePart>
          </mods:name>
          <mods:identifier type="urn">urn:nbn:de:test-123</mods:identifier>
          <mods:identifier type="purl">http://resolver.example.org/123</mods:identifier>
          <mods:language>
            <mods:languageTerm type="text">German</mods:languageTerm>
          </mods:language>
          <mods:genre>monograph</mods:genre>
          <mods:abstract>Three illustrated plates.</mods:abstract>
        </mods:mods>
      </mets:xmlData>
    </mets:mdWrap>
  </mets:dmdSec>
  <mets:amdSec>
    <mets:rightsMD ID="rights001">
      <mets:mdWrap MDTYPE="OTHER">
        <mets:xmlData>
          <dv:rights>
            <dv:owner>Example Library</dv:owner>
            <dv:ownerLogo>http://library.example.org/logo.png</dv:ownerLogo>
            <dv:ownerSiteURL>http://library.example.org</dv:ownerSiteURL>
            <dv:license>pdm</dv:license>
          </dv:rights>
        </mets:xmlData>
      </mets:mdWrap>
    </mets:rightsMD>
    <mets:digiprovMD ID="digiprov001">
      <mets:mdWrap MDTYPE="OTHER">
        <mets:xmlData>
          <dv:links>
            <dv:presentation>http://viewer.example.org/show/123</dv:presentation>
          </dv:links>
        </mets:xmlData>
      </mets:mdWrap>
    </mets:digiprovMD>
  </mets:amdSec>
  <mets:fileSec>
    <mets:fileGrp USE="DEFAULT">
      <mets:file ID="img1" MIMETYPE="image/jpeg">
        <mets:FLocat LOCTYPE="URL" xlink:href="http://images.example.org/1.jpg"/>
      </mets:file>
      <mets:file ID="img2" MIMETYPE="image/jpeg">
        <mets:FLocat LOCTYPE="URL" xlink:href="http://images.example.org/2.jpg"/>
      </mets:file>
      <mets:file ID="img3" MIMETYPE="image/jpeg">
        <mets:FLocat LOCTYPE="URL" xlink:href="http://images.example.org/3.jpg"/>
      </mets:file>
      <mets:file ID="tiff1" MIMETYPE="image/tiff">
        <mets:FLocat LOCTYPE="URL" xlink:href="http://images.example.org/1.tif"/>
      </mets:file>
    </mets:fileGrp>
    <mets:fileGrp USE="DOWNLOAD">
      <mets:file ID="pdf1" MIMETYPE="application/pdf">
        <mets:FLocat LOCTYPE="URL" xlink:href="http://images.example.org/full.pdf"/>
      </mets:file>
    </mets:fileGrp>
  </mets:fileSec>
  <mets:structMap TYPE="PHYSICAL">
    <mets:div TYPE="physSequence">
      <mets:div ID="phys3" TYPE="page" ORDER="3" ORDERLABEL="3r">
        <mets:fptr FILEID="img3"/>
      </mets:div>
      <mets:div ID="phys1" TYPE="page" ORDER="1" LABEL="Title page">
        <mets:fptr FILEID="img1"/>
        <mets:fptr FILEID="tiff1"/>
      </mets:div>
      <mets:div ID="phys2" TYPE="page" ORDER="2">
        <mets:fptr FILEID="img2"/>
      </mets:div>
      <mets:div ID="phys4" TYPE="page" ORDER="4">
        <mets:fptr FILEID="missing"/>
      </mets:div>
    </mets:div>
  </mets:structMap>
  <mets:structMap TYPE="LOGICAL">
    <mets:div ID="log1" TYPE="monograph" LABEL="Historische Drucke">
      <mets:div ID="log2" TYPE="chapter" LABEL="Plates"/>
    </mets:div>
  </mets:structMap>
  <mets:structLink>
    <mets:smLink xlink:from="log1" xlink:to="phys1"/>
    <mets:smLink xlink:from="log2" xlink:to="phys2"/>
    <mets:smLink xlink:from="log2" xlink:to="phys3"/>
  </mets:structLink>
</mets:mets>
"#;
