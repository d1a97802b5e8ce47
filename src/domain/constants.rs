//! Fixed literals shared with MSBuild and the MicroBuild signing integration.
//!
//! These are the defaults for [`crate::domain::manifest::ManifestSettings`];
//! the backend rejects manifests whose literals drift from what it expects.

/// MSBuild project namespace.
pub const MSBUILD_NAMESPACE: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

/// Fixed file name of the generated project inside the run directory.
pub const MANIFEST_FILE_NAME: &str = "build.proj";

/// Settings import, relative to the source-tree root.
pub const SETTINGS_IMPORT: &str = r"build\Targets\VSL.Settings.targets";

/// MSBuild property holding the root of restored NuGet packages.
pub const PACKAGE_ROOT_PROPERTY: &str = "NuGetPackageRoot";

/// Package providing the `SignFiles` task.
pub const BACKEND_PACKAGE: &str = "MicroBuild.Core";

/// Pinned version of the backend package.
pub const BACKEND_VERSION: &str = "0.2.0";

/// MSBuild property the engine substitutes with the Authenticode certificate.
pub const CERTIFICATE_PROPERTY: &str = "AuthenticodeCertificateName";

/// Strong-name key identifier for every signed file.
pub const STRONG_NAME: &str = "MsSharedLib72";

/// Name of the target that runs the signing task.
pub const TARGET_NAME: &str = "RoslynSign";

/// Item type carrying the files to sign.
pub const ITEM_NAME: &str = "FilesToSign";

/// Signing mode: a real signature, not a test one.
pub const SIGN_TYPE: &str = "real";

/// Minimal MSBuild verbosity.
pub const DEFAULT_VERBOSITY: &str = "m";

/// Location of MSBuild below the 32-bit program files folder.
pub const ENGINE_RELATIVE_PATH: &str = r"MSBuild\14.0\Bin\MSBuild.exe";

/// Environment variable naming the 32-bit program files folder.
pub const PROGRAM_FILES_X86_VAR: &str = "ProgramFiles(x86)";

/// Used when [`PROGRAM_FILES_X86_VAR`] is not set.
pub const PROGRAM_FILES_X86_FALLBACK: &str = r"C:\Program Files (x86)";
