//! Proxy builders and extension parsing.

use std::collections::BTreeSet;
use std::path::Path;

use vp_core::VpResult;
use vp_proxy::Proxy;

use crate::{RegistryError, RegistryResult};

/// Normalized form of an extension: no leading period, lowercase.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}

/// Extension of `uri`: the text after the last period of its file name.
///
/// Returns `None` when the file name has no period or nothing follows it.
pub fn extension_of(uri: &Path) -> Option<String> {
    let name = uri.file_name()?.to_string_lossy();
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_lowercase())
    }
}

/// Constructs proxies for one family of file types.
pub trait ProxyBuilder: Send + Sync {
    /// Display name, used in logs and listings.
    fn name(&self) -> &str;

    /// Supported extensions. Case and a leading period are ignored.
    fn extensions(&self) -> BTreeSet<String>;

    /// Construct the proxy once `uri` has been validated.
    fn build(&self, uri: &Path) -> VpResult<Proxy>;

    fn supports(&self, uri: &Path) -> bool {
        extension_of(uri).is_some_and(|ext| {
            self.extensions()
                .iter()
                .any(|supported| normalize_extension(supported) == ext)
        })
    }

    /// Validate `uri` and build a proxy for it.
    ///
    /// # Errors
    ///
    /// [`RegistryError::MissingArgument`] for an empty path,
    /// [`RegistryError::UnsupportedInput`] when the extension is missing or
    /// not supported, [`RegistryError::Build`] when construction fails.
    fn create_proxy(&self, uri: &Path) -> RegistryResult<Proxy> {
        if uri.as_os_str().is_empty() {
            return Err(RegistryError::MissingArgument { what: "uri" });
        }
        if !self.supports(uri) {
            return Err(RegistryError::UnsupportedInput {
                uri: uri.display().to_string(),
            });
        }
        Ok(self.build(uri)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vp_core::ProxyOptions;
    use vp_proxy::BaseStrategy;

    struct Exodus;

    impl ProxyBuilder for Exodus {
        fn name(&self) -> &str {
            "exodus"
        }

        fn extensions(&self) -> BTreeSet<String> {
            ["e", ".EXO"].into_iter().map(String::from).collect()
        }

        fn build(&self, uri: &Path) -> VpResult<Proxy> {
            Proxy::new(uri, Box::new(BaseStrategy), ProxyOptions::default())
        }
    }

    #[test]
    fn extension_is_taken_after_the_last_period() {
        assert_eq!(extension_of(Path::new("/data/can.exo")), Some("exo".to_string()));
        assert_eq!(extension_of(Path::new("run.2.E")), Some("e".to_string()));
        assert_eq!(extension_of(Path::new("/data.d/mesh")), None);
        assert_eq!(extension_of(Path::new("mesh.")), None);
        assert_eq!(extension_of(Path::new("")), None);
    }

    #[test]
    fn normalize_strips_period_and_case() {
        assert_eq!(normalize_extension(".VTU"), "vtu");
        assert_eq!(normalize_extension("vtu"), "vtu");
    }

    #[test]
    fn create_proxy_validates_uri() {
        let builder = Exodus;

        let err = builder.create_proxy(Path::new("")).err().unwrap();
        assert!(matches!(err, RegistryError::MissingArgument { .. }));

        let err = builder.create_proxy(Path::new("/data/mesh")).err().unwrap();
        assert!(matches!(err, RegistryError::UnsupportedInput { .. }));

        let err = builder.create_proxy(Path::new("/data/mesh.vtu")).err().unwrap();
        assert!(matches!(err, RegistryError::UnsupportedInput { .. }));

        let proxy = builder.create_proxy(Path::new("/data/can.EXO")).unwrap();
        assert_eq!(proxy.uri(), Path::new("/data/can.EXO"));
        assert!(builder.create_proxy(Path::new("/data/wave.e")).is_ok());
    }
}
