use meshview_render::shaders;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("no built-in shader named `{0}`")]
    UnknownBuiltin(String),
    #[error("failed to read shader `{stem}` from {path}: {source}")]
    Io {
        stem: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where shader sources come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShaderLibrary {
    /// The sources compiled into `meshview_render::shaders`.
    #[default]
    Builtin,
    /// `<dir>/<stem>.wgsl` files.
    Directory(PathBuf),
}

impl ShaderLibrary {
    pub const EXTENSION: &'static str = "wgsl";

    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self::Directory(dir.into())
    }

    /// Built-in sources unless a directory is given.
    pub fn from_option(dir: Option<&Path>) -> Self {
        dir.map_or(Self::Builtin, Self::directory)
    }

    /// File a stem resolves to, for directory libraries.
    pub fn path_for(&self, stem: &str) -> Option<PathBuf> {
        match self {
            Self::Builtin => None,
            Self::Directory(dir) => Some(dir.join(format!("{stem}.{}", Self::EXTENSION))),
        }
    }

    pub fn source(&self, stem: &str) -> Result<Cow<'static, str>, LibraryError> {
        match self {
            Self::Builtin => shaders::builtin(stem)
                .map(Cow::Borrowed)
                .ok_or_else(|| LibraryError::UnknownBuiltin(stem.to_string())),
            Self::Directory(dir) => {
                let path = dir.join(format!("{stem}.{}", Self::EXTENSION));
                std::fs::read_to_string(&path)
                    .map(Cow::Owned)
                    .map_err(|source| LibraryError::Io {
                        stem: stem.to_string(),
                        path,
                        source,
                    })
            }
        }
    }

    /// Write every built-in source into `dir` as `<stem>.wgsl`.
    pub fn export_builtins(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        shaders::BUILTIN_STEMS
            .iter()
            .map(|stem| {
                let path = dir.join(format!("{stem}.{}", Self::EXTENSION));
                let source = shaders::builtin(stem).unwrap_or_default();
                std::fs::write(&path, source)?;
                Ok(path)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sources_resolve() {
        let lib = ShaderLibrary::Builtin;
        assert_eq!(lib.source("color_vs").unwrap(), shaders::COLOR_VS);
        assert!(matches!(
            lib.source("missing"),
            Err(LibraryError::UnknownBuiltin(_))
        ));
        assert_eq!(lib.path_for("color_vs"), None);
    }

    #[test]
    fn directory_reads_stem_with_extension() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("custom_fs.wgsl"), "// custom").unwrap();
        let lib = ShaderLibrary::directory(tmp.path());
        assert_eq!(lib.source("custom_fs").unwrap(), "// custom");
        assert_eq!(
            lib.path_for("custom_fs"),
            Some(tmp.path().join("custom_fs.wgsl"))
        );
    }

    #[test]
    fn missing_file_reports_path() {
        let tmp = tempfile::tempdir().unwrap();
        let lib = ShaderLibrary::directory(tmp.path());
        let err = lib.source("absent").unwrap_err();
        assert!(err.to_string().contains("absent.wgsl"));
    }

    #[test]
    fn exported_builtins_load_back() {
        let tmp = tempfile::tempdir().unwrap();
        let written = ShaderLibrary::export_builtins(tmp.path()).unwrap();
        assert_eq!(written.len(), shaders::BUILTIN_STEMS.len());
        let lib = ShaderLibrary::from_option(Some(tmp.path()));
        assert_eq!(lib.source("tint_fs").unwrap(), shaders::TINT_FS);
    }
}
