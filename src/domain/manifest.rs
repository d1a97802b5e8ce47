//! MSBuild signing project generation.
//!
//! The manifest is written with a structured XML writer so file paths and
//! directories containing markup characters are escaped rather than spliced
//! into the document.

use crate::domain::constants;
use crate::domain::types::{SignLayout, SigningRequest};
use crate::infra::error::{SigningError, SigningResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Literals written into every manifest.
///
/// All of them are part of the contract with the signing backend; they are
/// configurable so a backend upgrade is a configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestSettings {
    /// Namespace of the `Project` root element
    pub namespace: String,
    /// Settings import, relative to the source-tree root
    pub settings_import: String,
    /// MSBuild property naming the NuGet package root
    pub package_root_property: String,
    /// Package providing the signing targets
    pub backend_package: String,
    /// Pinned backend package version
    pub backend_version: String,
    /// MSBuild property holding the Authenticode certificate name
    pub certificate_property: String,
    /// Strong-name key identifier
    pub strong_name: String,
    /// Item type for the files to sign
    pub item_name: String,
    /// Name of the signing target
    pub target_name: String,
    /// `Type` passed to `SignFiles`
    pub sign_type: String,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            namespace: constants::MSBUILD_NAMESPACE.to_string(),
            settings_import: constants::SETTINGS_IMPORT.to_string(),
            package_root_property: constants::PACKAGE_ROOT_PROPERTY.to_string(),
            backend_package: constants::BACKEND_PACKAGE.to_string(),
            backend_version: constants::BACKEND_VERSION.to_string(),
            certificate_property: constants::CERTIFICATE_PROPERTY.to_string(),
            strong_name: constants::STRONG_NAME.to_string(),
            item_name: constants::ITEM_NAME.to_string(),
            target_name: constants::TARGET_NAME.to_string(),
            sign_type: constants::SIGN_TYPE.to_string(),
        }
    }
}

impl ManifestSettings {
    /// Settings import joined onto the source-tree root.
    #[must_use]
    pub fn settings_import_path(&self, source_root: &Path) -> String {
        source_root.join(&self.settings_import).display().to_string()
    }

    /// Backend integration file with the given extension (`props` or `targets`).
    #[must_use]
    pub fn backend_import(&self, extension: &str) -> String {
        format!(
            r"$({root})\{package}\{version}\build\{package}.{extension}",
            root = self.package_root_property,
            package = self.backend_package,
            version = self.backend_version,
        )
    }

    /// Unresolved certificate reference left for MSBuild to substitute.
    #[must_use]
    pub fn certificate_reference(&self) -> String {
        format!("$({})", self.certificate_property)
    }

    /// Item list reference passed to `SignFiles`.
    #[must_use]
    pub fn item_reference(&self) -> String {
        format!("@({})", self.item_name)
    }

    /// Reject settings that would produce a manifest the backend cannot use.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` naming the offending field.
    pub fn validate(&self) -> SigningResult<()> {
        let required = [
            ("namespace", &self.namespace),
            ("settings_import", &self.settings_import),
            ("package_root_property", &self.package_root_property),
            ("backend_package", &self.backend_package),
            ("backend_version", &self.backend_version),
            ("certificate_property", &self.certificate_property),
            ("strong_name", &self.strong_name),
            ("item_name", &self.item_name),
            ("target_name", &self.target_name),
            ("sign_type", &self.sign_type),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(SigningError::ConfigurationError(format!(
                    "Manifest setting '{field}' must not be empty"
                )));
            }
        }

        if self.backend_version.contains(['/', '\\']) {
            return Err(SigningError::ConfigurationError(format!(
                "Backend version must not contain path separators: {}",
                self.backend_version
            )));
        }

        for (field, value) in [
            ("item_name", &self.item_name),
            ("target_name", &self.target_name),
        ] {
            if !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(SigningError::ConfigurationError(format!(
                    "Manifest setting '{field}' must be a plain MSBuild name: {value}"
                )));
            }
        }

        Ok(())
    }
}

/// A generated signing project, ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    content: String,
    file_count: usize,
}

impl ManifestDocument {
    /// Generate the signing project for `request`.
    ///
    /// `intermediates_dir` is embedded verbatim; callers pass the temporary
    /// directory of the generating machine.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError` if the XML writer fails.
    pub fn generate(
        settings: &ManifestSettings,
        layout: &SignLayout,
        intermediates_dir: &Path,
        request: &SigningRequest,
    ) -> SigningResult<Self> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;

        let mut project = BytesStart::new("Project");
        project.push_attribute(("xmlns", settings.namespace.as_str()));
        writer
            .write_event(Event::Start(project))
            .map_err(xml_error)?;

        write_import(
            &mut writer,
            &settings.settings_import_path(&layout.source_path),
        )?;
        write_import(&mut writer, &settings.backend_import("props"))?;
        write_import(&mut writer, &settings.backend_import("targets"))?;

        writer
            .write_event(Event::Start(BytesStart::new("ItemGroup")))
            .map_err(xml_error)?;
        let certificate = settings.certificate_reference();
        for file in request.files() {
            let mut item = BytesStart::new(settings.item_name.as_str());
            item.push_attribute(("Include", file.as_str()));
            writer.write_event(Event::Start(item)).map_err(xml_error)?;
            write_text_element(&mut writer, "Authenticode", &certificate)?;
            write_text_element(&mut writer, "StrongName", &settings.strong_name)?;
            writer
                .write_event(Event::End(BytesEnd::new(settings.item_name.as_str())))
                .map_err(xml_error)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("ItemGroup")))
            .map_err(xml_error)?;

        let mut target = BytesStart::new("Target");
        target.push_attribute(("Name", settings.target_name.as_str()));
        writer.write_event(Event::Start(target)).map_err(xml_error)?;

        let binaries = layout.binaries_path.display().to_string();
        let intermediates = intermediates_dir.display().to_string();
        let items = settings.item_reference();
        let sign_files = BytesStart::new("SignFiles").with_attributes([
            ("Files", items.as_str()),
            ("BinariesDirectory", binaries.as_str()),
            ("IntermediatesDirectory", intermediates.as_str()),
            ("Type", settings.sign_type.as_str()),
        ]);
        writer
            .write_event(Event::Empty(sign_files))
            .map_err(xml_error)?;

        writer
            .write_event(Event::End(BytesEnd::new("Target")))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("Project")))
            .map_err(xml_error)?;

        let mut content = String::from_utf8(writer.into_inner())
            .map_err(|e| SigningError::ManifestError(format!("Manifest is not UTF-8: {e}")))?;
        content.push('\n');

        log::debug!(
            "Generated manifest with {} file(s), {} bytes",
            request.len(),
            content.len()
        );

        Ok(Self {
            content,
            file_count: request.len(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.content
    }

    /// Number of `FilesToSign` entries in the document.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Overwrite `path` with the document.
    ///
    /// # Errors
    ///
    /// Returns `IoError` naming the path when the write fails.
    pub fn write_to(&self, path: &Path) -> SigningResult<()> {
        std::fs::write(path, &self.content).map_err(|e| {
            SigningError::IoError(format!(
                "Failed to write manifest {}: {e}",
                path.display()
            ))
        })
    }
}

impl fmt::Display for ManifestDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

fn write_import(writer: &mut Writer<Vec<u8>>, project: &str) -> SigningResult<()> {
    let import = BytesStart::new("Import").with_attributes([("Project", project)]);
    writer.write_event(Event::Empty(import)).map_err(xml_error)
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> SigningResult<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn xml_error<E: fmt::Display>(error: E) -> SigningError {
    SigningError::ManifestError(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn layout() -> SignLayout {
        SignLayout::new("/work/run", "/work/Binaries/Release", "/src/roslyn")
    }

    fn generate(files: &[&str]) -> ManifestDocument {
        ManifestDocument::generate(
            &ManifestSettings::default(),
            &layout(),
            Path::new("/tmp"),
            &SigningRequest::new(files.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn test_default_settings_literals() {
        let settings = ManifestSettings::default();
        assert_eq!(settings.target_name, "RoslynSign");
        assert_eq!(settings.strong_name, "MsSharedLib72");
        assert_eq!(settings.backend_version, "0.2.0");
        assert_eq!(settings.sign_type, "real");
        assert_eq!(
            settings.backend_import("props"),
            r"$(NuGetPackageRoot)\MicroBuild.Core\0.2.0\build\MicroBuild.Core.props"
        );
        assert_eq!(
            settings.certificate_reference(),
            "$(AuthenticodeCertificateName)"
        );
        assert_eq!(settings.item_reference(), "@(FilesToSign)");
        settings.validate().unwrap();
    }

    #[test]
    fn test_header_and_namespace() {
        let doc = generate(&["a.dll"]);
        let text = doc.as_str();
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(text.contains(
            r#"<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">"#
        ));
        assert!(text.trim_end().ends_with("</Project>"));
    }

    #[test]
    fn test_items_follow_input_order() {
        let doc = generate(&["z.dll", "a.exe", "z.dll"]);
        let text = doc.as_str();
        let z = text.find(r#"Include="z.dll""#).unwrap();
        let a = text.find(r#"Include="a.exe""#).unwrap();
        assert!(z < a);
        assert_eq!(text.matches("<FilesToSign ").count(), 3);
        assert_eq!(
            text.matches("<StrongName>MsSharedLib72</StrongName>").count(),
            3
        );
        assert_eq!(
            text.matches("<Authenticode>$(AuthenticodeCertificateName)</Authenticode>")
                .count(),
            3
        );
        assert_eq!(doc.file_count(), 3);
    }

    #[test]
    fn test_reserved_characters_are_escaped() {
        let doc = generate(&[r#"C:\out\a&b<"c">.dll"#]);
        let text = doc.as_str();
        assert!(text.contains("a&amp;b&lt;&quot;c&quot;&gt;.dll"));
        assert!(!text.contains("a&b"));
    }

    #[test]
    fn test_settings_import_uses_source_root() {
        let settings = ManifestSettings::default();
        let expected = PathBuf::from("/src/roslyn")
            .join(r"build\Targets\VSL.Settings.targets")
            .display()
            .to_string();
        assert_eq!(
            settings.settings_import_path(Path::new("/src/roslyn")),
            expected
        );
        assert!(generate(&[]).as_str().contains(&expected));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let settings = ManifestSettings {
            backend_version: String::new(),
            ..ManifestSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SigningError::ConfigurationError(_))
        ));

        let settings = ManifestSettings {
            backend_version: r"0.2.0\..\evil".to_string(),
            ..ManifestSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = ManifestSettings {
            target_name: "Roslyn Sign".to_string(),
            ..ManifestSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_write_overwrites() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("build.proj");
        std::fs::write(&path, "stale content that is longer than nothing").unwrap();

        let doc = generate(&[]);
        doc.write_to(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), doc.as_str());
    }
}
