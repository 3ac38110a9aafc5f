//! Output base-name policy.

use std::path::Path;

use rand::distr::Alphanumeric;
use rand::Rng;
use vstream_models::VideoJob;

/// Length of generated output names.
pub const RANDOM_NAME_LEN: usize = 10;

/// Base name for a job's artifacts.
///
/// The input file name without its extension, or a fresh random name when the
/// job asks for renamed output. An input path without a usable file name also
/// gets a random name.
pub fn resolve_base_name(job: &VideoJob) -> String {
    if job.options.rename_output {
        return random_base_name();
    }
    file_stem(job.input_path()).unwrap_or_else(random_base_name)
}

/// Random ASCII alphanumeric name of [`RANDOM_NAME_LEN`] characters.
pub fn random_base_name() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_NAME_LEN)
        .map(char::from)
        .collect()
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}
