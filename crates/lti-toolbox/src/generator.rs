// crates/lti-toolbox/src/generator.rs
// ============================================================================
// Module: Configuration XML Generator
// Description: Renders tool identity and placements as LTI cartridge XML.
// Purpose: Produce the document an LMS consumes when installing the tool.
// Dependencies: lti-toolbox-core
// ============================================================================

//! ## Overview
//! [`Generator`] validates as it is built: name, id, and launch URL must be
//! non-empty, the privacy level must be recognized, and every option must
//! name a known placement. Rendering a validated generator cannot fail.
//!
//! With no options configured the document carries a single
//! `course_navigation` block. Each option block inherits `text` (tool name)
//! and `url` (launch URL) unless it sets them itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;

use lti_toolbox_core::ConfigurationError;
use lti_toolbox_core::LaunchPrivacy;
use lti_toolbox_core::Placement;
use lti_toolbox_core::ToolMetadata;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Cartridge namespace (default namespace of the document).
pub const LTICC_NAMESPACE: &str = "http://www.imsglobal.org/xsd/imslticc_v1p0";
/// Basic LTI namespace.
pub const BLTI_NAMESPACE: &str = "http://www.imsglobal.org/xsd/imsbasiclti_v1p0";
/// LTI common messaging namespace.
pub const LTICM_NAMESPACE: &str = "http://www.imsglobal.org/xsd/imslticm_v1p0";
/// LTI common profile namespace.
pub const LTICP_NAMESPACE: &str = "http://www.imsglobal.org/xsd/imslticp_v1p0";
/// XML Schema instance namespace.
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Extension platform attribute value.
const CANVAS_PLATFORM: &str = "canvas.instructure.com";
/// Indentation unit.
const INDENT: &str = "  ";

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Validated cartridge XML generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    /// Tool name.
    name: String,
    /// Tool id.
    id: String,
    /// Launch URL.
    launch_url: String,
    /// Optional description.
    description: Option<String>,
    /// Optional icon URL.
    icon_url: Option<String>,
    /// Privacy level.
    launch_privacy: LaunchPrivacy,
    /// Optional domain.
    domain: Option<String>,
    /// Placement blocks in insertion order.
    options: Vec<(Placement, Vec<(String, String)>)>,
}

impl Generator {
    /// Creates a generator with anonymous privacy and no options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidToolProvider`] when the name,
    /// id, or launch URL is empty.
    pub fn new(
        name: impl Into<String>,
        id: impl Into<String>,
        launch_url: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let generator = Self {
            name: name.into(),
            id: id.into(),
            launch_url: launch_url.into(),
            description: None,
            icon_url: None,
            launch_privacy: LaunchPrivacy::Anonymous,
            domain: None,
            options: Vec::new(),
        };
        let required = [
            ("name", &generator.name),
            ("id", &generator.id),
            ("launch url", &generator.launch_url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigurationError::InvalidToolProvider(format!(
                    "the configuration must specify a non-empty {field}"
                )));
            }
        }
        Ok(generator)
    }

    /// Builds a generator from cached tool metadata.
    ///
    /// Missing privacy defaults to `public`.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`Generator::new`],
    /// [`Generator::with_launch_privacy`], and [`Generator::set_option`].
    pub fn from_metadata(metadata: &ToolMetadata) -> Result<Self, ConfigurationError> {
        let mut generator = Self::new(
            metadata.name.clone().unwrap_or_default(),
            metadata.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            metadata.launch_url.clone().unwrap_or_default(),
        )?
        .with_launch_privacy(
            metadata.launch_privacy.as_deref().unwrap_or(LaunchPrivacy::Public.as_str()),
        )?;
        generator.description = non_empty(metadata.description.as_deref());
        generator.icon_url = non_empty(metadata.icon_url.as_deref());
        generator.domain = non_empty(metadata.domain.as_deref());
        for placement in &metadata.placements {
            generator.set_option(&placement.option, placement.properties.clone())?;
        }
        Ok(generator)
    }

    /// Sets the description; blank clears it.
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = non_empty(Some(description));
        self
    }

    /// Sets the icon URL; blank clears it.
    #[must_use]
    pub fn with_icon_url(mut self, icon_url: &str) -> Self {
        self.icon_url = non_empty(Some(icon_url));
        self
    }

    /// Sets the domain; blank clears it.
    #[must_use]
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = non_empty(Some(domain));
        self
    }

    /// Sets the privacy level; blank keeps the anonymous default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPrivacyLevel`] for unknown levels.
    pub fn with_launch_privacy(mut self, privacy: &str) -> Result<Self, ConfigurationError> {
        if !privacy.trim().is_empty() {
            self.launch_privacy = LaunchPrivacy::from_str(privacy)?;
        }
        Ok(self)
    }

    /// Replaces the properties of `option`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidOption`] for unknown placements.
    pub fn set_option<I, K, V>(
        &mut self,
        option: &str,
        properties: I,
    ) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let placement = Placement::from_str(option)?;
        let properties: Vec<(String, String)> =
            properties.into_iter().map(|(name, value)| (name.into(), value.into())).collect();
        *self.option_entry(placement) = properties;
        Ok(())
    }

    /// Sets a single property on `option`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidOption`] for unknown placements.
    pub fn set_option_property(
        &mut self,
        option: &str,
        name: &str,
        value: &str,
    ) -> Result<(), ConfigurationError> {
        let placement = Placement::from_str(option)?;
        let properties = self.option_entry(placement);
        match properties.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) => value.clone_into(existing),
            None => properties.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Renders the cartridge XML document.
    #[must_use]
    pub fn save_xml(&self) -> String {
        let schema_location = [LTICC_NAMESPACE, BLTI_NAMESPACE, LTICM_NAMESPACE, LTICP_NAMESPACE]
            .iter()
            .map(|namespace| format!("{namespace} {namespace}.xsd"))
            .collect::<Vec<_>>()
            .join(" ");
        let mut xml = XmlWriter::new();
        xml.open(
            "cartridge_basiclti_link",
            &[
                ("xmlns", LTICC_NAMESPACE),
                ("xmlns:blti", BLTI_NAMESPACE),
                ("xmlns:lticm", LTICM_NAMESPACE),
                ("xmlns:lticp", LTICP_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", schema_location.as_str()),
            ],
        );
        xml.text_element("blti:title", &[], &self.name);
        if let Some(description) = &self.description {
            xml.text_element("blti:description", &[], description);
        }
        if let Some(icon_url) = &self.icon_url {
            xml.text_element("blti:icon", &[], icon_url);
        }
        xml.text_element("blti:launch_url", &[], &self.launch_url);

        xml.open("blti:extensions", &[("platform", CANVAS_PLATFORM)]);
        xml.text_element("lticm:property", &[("name", "tool_id")], &self.id);
        xml.text_element(
            "lticm:property",
            &[("name", "privacy_level")],
            self.launch_privacy.as_str(),
        );
        if let Some(domain) = &self.domain {
            xml.text_element("lticm:property", &[("name", "domain")], domain);
        }
        if self.options.is_empty() {
            self.write_option(&mut xml, Placement::CourseNavigation, &[]);
        } else {
            for (placement, properties) in &self.options {
                self.write_option(&mut xml, *placement, properties);
            }
        }
        xml.close("blti:extensions");

        xml.empty_element("cartridge_bundle", &[("identifierref", "BLT001_Bundle")]);
        xml.empty_element("cartridge_icon", &[("identifierref", "BLT001_Icon")]);
        xml.close("cartridge_basiclti_link");
        xml.finish()
    }

    /// Returns the property list of `placement`, creating it when absent.
    fn option_entry(&mut self, placement: Placement) -> &mut Vec<(String, String)> {
        let index = match self.options.iter().position(|(existing, _)| *existing == placement) {
            Some(index) => index,
            None => {
                self.options.push((placement, Vec::new()));
                self.options.len() - 1
            }
        };
        &mut self.options[index].1
    }

    /// Writes one option block with inherited `text` and `url`.
    fn write_option(
        &self,
        xml: &mut XmlWriter,
        placement: Placement,
        properties: &[(String, String)],
    ) {
        xml.open("lticm:options", &[("name", placement.as_str())]);
        for (name, value) in properties {
            xml.text_element("lticm:property", &[("name", name.as_str())], value);
        }
        if !properties.iter().any(|(name, _)| name == "text") {
            xml.text_element("lticm:property", &[("name", "text")], &self.name);
        }
        if !properties.iter().any(|(name, _)| name == "url") {
            xml.text_element("lticm:property", &[("name", "url")], &self.launch_url);
        }
        xml.close("lticm:options");
    }
}

// ============================================================================
// SECTION: XML Writer
// ============================================================================

/// Minimal indenting XML writer.
struct XmlWriter {
    /// Rendered output.
    out: String,
    /// Current element depth.
    depth: usize,
}

impl XmlWriter {
    /// Starts a document with the XML declaration.
    fn new() -> Self {
        Self {
            out: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"),
            depth: 0,
        }
    }

    /// Opens an element that will hold children.
    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.start_tag(name, attributes);
        self.out.push_str(">\n");
        self.depth += 1;
    }

    /// Closes the innermost element.
    fn close(&mut self, name: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push_str(">\n");
    }

    /// Writes an element with text content.
    fn text_element(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) {
        self.start_tag(name, attributes);
        self.out.push('>');
        self.out.push_str(&escape(text));
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push_str(">\n");
    }

    /// Writes a self-closing element.
    fn empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.start_tag(name, attributes);
        self.out.push_str("/>\n");
    }

    /// Writes `<name attr="value"...` without the closing bracket.
    fn start_tag(&mut self, name: &str, attributes: &[(&str, &str)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(name);
        for (attribute, value) in attributes {
            self.out.push(' ');
            self.out.push_str(attribute);
            self.out.push_str("=\"");
            self.out.push_str(&escape(value));
            self.out.push('"');
        }
    }

    /// Indents to the current depth.
    fn indent(&mut self) {
        for _ in 0 .. self.depth {
            self.out.push_str(INDENT);
        }
    }

    /// Returns the rendered document.
    fn finish(self) -> String {
        self.out
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Escapes XML special characters in text and attribute values.
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Returns an owned copy of `value` when it is not blank.
fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}
