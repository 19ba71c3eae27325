pub mod url;

pub use self::url::render_pullspec_override_url;
