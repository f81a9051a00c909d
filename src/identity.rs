//! Module identity system for dependency resolution.
//!
//! This module provides the identification tuple used to compare two module
//! references for equivalence during dependency resolution. The identity is
//! distinct from the file path used for shadow-copy cache lookups: the cache
//! answers "have I copied this file", the identity answers "is this the module
//! a reference asks for".
//!
//! # Key Components
//!
//! - [`ModuleIdentity`] - Complete identification with name, version, culture, key token,
//!   retargetable flag, and content kind
//! - [`ModuleVersion`] - Four-part version numbering (major.minor.build.revision)
//! - [`ContentKind`] - Content classification of a module reference
//!
//! # Equality Semantics
//!
//! Two identities are compared by the **full tuple** - name, version, culture,
//! public key token, retargetable flag, and content kind. A reference carrying a
//! different key token therefore never matches a module registered under another
//! token. This is the resolution key used by the ambient registry in
//! [`crate::loader::ModuleLoader`].
//!
//! # Examples
//!
//! ```rust
//! use loadscope::identity::{ModuleIdentity, ModuleVersion};
//!
//! // Simple identity without a key token
//! let simple = ModuleIdentity::new("MyLibrary", ModuleVersion::new(1, 2, 3, 4));
//!
//! // Parse from a display name
//! let parsed = ModuleIdentity::parse(
//!     "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
//! )?;
//! assert_eq!(parsed.name, "mscorlib");
//! # Ok::<(), loadscope::Error>(())
//! ```

use std::{fmt, fmt::Write as _, str::FromStr};

use crate::{Error, Result};

/// Content classification of a module reference.
///
/// Modules of different content kinds are never interchangeable, so the kind
/// participates in identity comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentKind {
    /// Ordinary executable module content.
    #[default]
    Default,

    /// Windows Runtime metadata content.
    WindowsRuntime,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Default => write!(f, "Default"),
            ContentKind::WindowsRuntime => write!(f, "WindowsRuntime"),
        }
    }
}

/// Four-part version numbering for modules.
///
/// Versions are compared component-wise in order: major, minor, build, revision.
///
/// # Examples
///
/// ```rust
/// use loadscope::identity::ModuleVersion;
///
/// let version = ModuleVersion::new(1, 2, 3, 4);
/// assert_eq!(version.to_string(), "1.2.3.4");
///
/// let parsed: ModuleVersion = "2.0.0.0".parse()?;
/// assert!(parsed > version);
/// # Ok::<(), loadscope::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModuleVersion {
    /// Major version component.
    pub major: u16,
    /// Minor version component.
    pub minor: u16,
    /// Build version component.
    pub build: u16,
    /// Revision version component.
    pub revision: u16,
}

impl ModuleVersion {
    /// Create a new version from its four components.
    #[must_use]
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for ModuleVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut components = [0u16; 4];
        let mut count = 0;

        for part in s.split('.') {
            if count >= 4 {
                return Err(malformed_error!("Version '{}' has more than 4 components", s));
            }
            components[count] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component '{}' in '{}'", part, s))?;
            count += 1;
        }

        if count == 0 {
            return Err(malformed_error!("Empty version string"));
        }

        Ok(ModuleVersion {
            major: components[0],
            minor: components[1],
            build: components[2],
            revision: components[3],
        })
    }
}

/// Complete identity information for a loadable module.
///
/// This is the resolution key: a dependency reference is translated into a
/// `ModuleIdentity` and matched against the host's ambient registry and the
/// caller-supplied resolver. All six components participate in equality and
/// hashing.
///
/// # Examples
///
/// ```rust
/// use loadscope::identity::{ModuleIdentity, ModuleVersion};
///
/// let identity = ModuleIdentity::new("ScriptRuntime", ModuleVersion::new(1, 0, 0, 0));
/// assert_eq!(
///     identity.display_name(),
///     "ScriptRuntime, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleIdentity {
    /// Simple module name (e.g., "mscorlib", "ScriptRuntime").
    pub name: String,

    /// Four-part version number.
    pub version: ModuleVersion,

    /// Culture for localized modules. `None` indicates a culture-neutral module.
    pub culture: Option<String>,

    /// Public key token identifying the module's signing key, if any.
    pub public_key_token: Option<[u8; 8]>,

    /// Whether the reference may be retargeted to another publisher's build.
    pub retargetable: bool,

    /// Content classification of the module.
    pub content_kind: ContentKind,
}

impl ModuleIdentity {
    /// Create a culture-neutral, untokened identity from a name and version.
    pub fn new(name: impl Into<String>, version: ModuleVersion) -> Self {
        Self {
            name: name.into(),
            version,
            culture: None,
            public_key_token: None,
            retargetable: false,
            content_kind: ContentKind::Default,
        }
    }

    /// Parse a module identity from a display name string.
    ///
    /// # Format
    ///
    /// ```text
    /// Name[, Version=Major.Minor.Build.Revision][, Culture=culture][, PublicKeyToken=token][, Retargetable=Yes]
    /// ```
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the display name cannot be parsed.
    pub fn parse(display_name: &str) -> Result<Self> {
        let parts: Vec<&str> = display_name.split(',').map(str::trim).collect();

        let name = parts[0].to_string();
        if name.is_empty() {
            return Err(malformed_error!("Module name cannot be empty"));
        }

        let mut identity = ModuleIdentity::new(name, ModuleVersion::default());

        for part in parts.iter().skip(1) {
            if let Some(value) = part.strip_prefix("Version=") {
                identity.version = value.parse()?;
            } else if let Some(value) = part.strip_prefix("Culture=") {
                if value != "neutral" {
                    identity.culture = Some(value.to_string());
                }
            } else if let Some(value) = part.strip_prefix("PublicKeyToken=") {
                if value != "null" && !value.is_empty() {
                    identity.public_key_token = Some(parse_key_token(value)?);
                }
            } else if let Some(value) = part.strip_prefix("Retargetable=") {
                identity.retargetable = value.eq_ignore_ascii_case("yes");
            } else if let Some(value) = part.strip_prefix("ContentType=") {
                if value.eq_ignore_ascii_case("WindowsRuntime") {
                    identity.content_kind = ContentKind::WindowsRuntime;
                }
            }
        }

        Ok(identity)
    }

    /// Generate the display name string for this identity.
    ///
    /// The format round-trips through [`ModuleIdentity::parse`].
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);

        result.push_str(&self.name);
        let _ = write!(result, ", Version={}", self.version);
        let _ = write!(
            result,
            ", Culture={}",
            self.culture.as_deref().unwrap_or("neutral")
        );

        result.push_str(", PublicKeyToken=");
        match &self.public_key_token {
            Some(token) => {
                for byte in token {
                    let _ = write!(result, "{:02x}", byte);
                }
            }
            None => result.push_str("null"),
        }

        if self.retargetable {
            result.push_str(", Retargetable=Yes");
        }

        if self.content_kind == ContentKind::WindowsRuntime {
            let _ = write!(result, ", ContentType={}", self.content_kind);
        }

        result
    }

    /// Get the simple module name without version or culture information.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// Check if this module is culture-neutral.
    #[must_use]
    pub fn is_culture_neutral(&self) -> bool {
        self.culture.is_none()
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Decode a 16-hex-character public key token.
fn parse_key_token(value: &str) -> Result<[u8; 8]> {
    if value.len() != 16 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed_error!(
            "PublicKeyToken must be exactly 16 hex characters, got '{}'",
            value
        ));
    }

    let mut token = [0u8; 8];
    for (i, chunk) in value.as_bytes().chunks_exact(2).enumerate() {
        let hex = std::str::from_utf8(chunk)
            .map_err(|_| malformed_error!("Invalid hex in PublicKeyToken '{}'", value))?;
        token[i] = u8::from_str_radix(hex, 16)
            .map_err(|_| malformed_error!("Invalid hex in PublicKeyToken '{}'", value))?;
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse_and_display() {
        let version: ModuleVersion = "1.2.3.4".parse().unwrap();
        assert_eq!(version, ModuleVersion::new(1, 2, 3, 4));
        assert_eq!(version.to_string(), "1.2.3.4");

        // Missing components default to zero
        let partial: ModuleVersion = "2.1".parse().unwrap();
        assert_eq!(partial, ModuleVersion::new(2, 1, 0, 0));

        assert!("1.2.3.4.5".parse::<ModuleVersion>().is_err());
        assert!("1.x".parse::<ModuleVersion>().is_err());
        assert!("".parse::<ModuleVersion>().is_err());
    }

    #[test]
    fn test_parse_simple_name() {
        let identity = ModuleIdentity::parse("MyLibrary").unwrap();
        assert_eq!(identity.name, "MyLibrary");
        assert_eq!(identity.version, ModuleVersion::default());
        assert!(identity.culture.is_none());
        assert!(identity.public_key_token.is_none());
        assert!(!identity.retargetable);
        assert_eq!(identity.content_kind, ContentKind::Default);
    }

    #[test]
    fn test_parse_full_display_name() {
        let identity = ModuleIdentity::parse(
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089, Retargetable=Yes",
        )
        .unwrap();

        assert_eq!(identity.name, "mscorlib");
        assert_eq!(identity.version, ModuleVersion::new(4, 0, 0, 0));
        assert!(identity.culture.is_none());
        assert_eq!(
            identity.public_key_token,
            Some([0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89])
        );
        assert!(identity.retargetable);
    }

    #[test]
    fn test_display_name_round_trip() {
        let original = ModuleIdentity {
            name: "Script.Host".to_string(),
            version: ModuleVersion::new(2, 1, 0, 7),
            culture: Some("en-US".to_string()),
            public_key_token: Some([1, 2, 3, 4, 5, 6, 7, 8]),
            retargetable: true,
            content_kind: ContentKind::Default,
        };

        let parsed = ModuleIdentity::parse(&original.display_name()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_full_tuple_equality() {
        let base = ModuleIdentity::new("Lib", ModuleVersion::new(1, 0, 0, 0));

        let mut other_token = base.clone();
        other_token.public_key_token = Some([0xff; 8]);
        assert_ne!(base, other_token);

        let mut other_kind = base.clone();
        other_kind.content_kind = ContentKind::WindowsRuntime;
        assert_ne!(base, other_kind);

        let mut retargetable = base.clone();
        retargetable.retargetable = true;
        assert_ne!(base, retargetable);

        assert_eq!(base, base.clone());
    }

    #[test]
    fn test_invalid_key_token() {
        assert!(ModuleIdentity::parse("Lib, PublicKeyToken=abcd").is_err());
        assert!(ModuleIdentity::parse("Lib, PublicKeyToken=zzzzzzzzzzzzzzzz").is_err());
    }

    #[test]
    fn test_parse_empty_name() {
        assert!(ModuleIdentity::parse("").is_err());
        assert!(ModuleIdentity::parse(", Version=1.0.0.0").is_err());
    }
}
