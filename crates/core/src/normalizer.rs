use crate::models::NormalizedTarget;
use regex::Regex;
use std::sync::OnceLock;

/// `{letter}{digits}[(letter)][-digits]_{free text}`, e.g. `H22_JOB`,
/// `R06(A)-2_道路台帳`.
const PROJECT_FOLDER_PATTERN: &str = r"^[A-Za-z]\d+(?:\([A-Za-z]\))?(?:-\d*)?_.+$";

fn project_folder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PROJECT_FOLDER_PATTERN).ok())
        .as_ref()
}

/// Pure key manipulation. Holds only the configured vocabulary.
#[derive(Debug, Clone)]
pub struct KeyNormalizer {
    redundant_prefixes: Vec<String>,
    extensions: Vec<String>,
}

impl KeyNormalizer {
    pub fn new<P, E>(
        redundant_prefixes: impl IntoIterator<Item = P>,
        extensions: impl IntoIterator<Item = E>,
    ) -> Self
    where
        P: AsRef<str>,
        E: AsRef<str>,
    {
        Self {
            redundant_prefixes: redundant_prefixes
                .into_iter()
                .map(|prefix| prefix.as_ref().trim_matches('/').to_string())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn normalize(&self, original_key: &str) -> NormalizedTarget {
        let relative = self.strip_routing_prefixes(original_key);
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();

        let file_name = segments.last().copied().unwrap_or_default();
        let base_name = self.strip_extension(file_name).to_string();

        let folders = segments.len().saturating_sub(1);
        let project_index = segments[..folders]
            .iter()
            .position(|segment| is_project_folder(segment));

        let project_folder = project_index.map(|index| segments[index].to_string());
        let subdirectory = project_index
            .map(|index| index + 1)
            .filter(|next| *next < folders)
            .map(|next| segments[next].to_string());

        NormalizedTarget {
            base_name,
            project_folder,
            subdirectory,
        }
    }

    /// Removes every leading routing marker (`documents/`, a doubled
    /// `documents/documents/`, `processed/`, ...) and leading slashes.
    /// Applying it twice gives the same result as applying it once.
    pub fn strip_routing_prefixes<'a>(&self, key: &'a str) -> &'a str {
        let mut rest = key.trim_start_matches('/');
        loop {
            let stripped = self.redundant_prefixes.iter().find_map(|prefix| {
                rest.strip_prefix(prefix.as_str())
                    .and_then(|tail| tail.strip_prefix('/'))
            });
            match stripped {
                Some(tail) => rest = tail.trim_start_matches('/'),
                None => return rest,
            }
        }
    }

    /// Drops a known convertible extension, compared case-insensitively.
    pub fn strip_extension<'a>(&self, file_name: &'a str) -> &'a str {
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && self.is_convertible_extension(ext) => stem,
            _ => file_name,
        }
    }

    pub fn is_convertible_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }

    pub fn is_convertible_file(&self, file_name: &str) -> bool {
        file_name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.is_convertible_extension(ext))
    }
}

pub fn is_project_folder(segment: &str) -> bool {
    project_folder_regex().is_some_and(|re| re.is_match(segment))
}

/// Swaps whatever extension the last segment carries for `new_ext`.
pub fn replace_extension(key: &str, new_ext: &str) -> String {
    let (dir, file_name) = match key.rsplit_once('/') {
        Some((dir, file_name)) => (Some(dir), file_name),
        None => (None, key),
    };
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}.{new_ext}"),
        None => format!("{stem}.{new_ext}"),
    }
}

/// Folder part of a key with its trailing slash, or `None` for a bare name.
pub fn parent_folder(key: &str) -> Option<&str> {
    key.rfind('/').map(|index| &key[..=index])
}
