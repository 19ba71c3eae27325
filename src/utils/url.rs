use crate::constants::PULLSPEC_OVERRIDES_PATH;
use crate::error::{FreshmakerError, FreshmakerResult};
use ::url::Url;
use uuid::Uuid;

/// URL where the build system fetches a bundle unit's CSV modifications.
///
/// Pure: depends only on the configured API base URL and the unit id.
pub fn render_pullspec_override_url(base_url: &str, build_id: Uuid) -> FreshmakerResult<String> {
    let mut base = Url::parse(base_url)
        .map_err(|e| FreshmakerError::InvalidInput(format!("Invalid API base URL {base_url}: {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let url = base
        .join(&format!("{PULLSPEC_OVERRIDES_PATH}/{build_id}"))
        .map_err(|e| FreshmakerError::InvalidInput(format!("Invalid override URL: {e}")))?;
    Ok(url.to_string())
}
