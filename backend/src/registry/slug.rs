use rand::RngCore;
use uuid::Uuid;

pub const API_KEY_PREFIX: &str = "mlh_";
const API_KEY_BYTES: usize = 24;
const SLUG_SUFFIX_LEN: usize = 8;

/// Lowercase URL-safe form of a model name. Runs of non-alphanumerics
/// collapse to single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "model".to_string()
    } else {
        slug
    }
}

/// Public identifier for a new model: slugified name plus a random hex
/// suffix, so concurrent uploads of the same name never collide.
pub fn generate_slug(name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", slugify(name), &suffix[..SLUG_SUFFIX_LEN])
}

/// Per-model bearer credential.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_lowercases() {
        assert_eq!(slugify("House Price Prediction"), "house-price-prediction");
        assert_eq!(slugify("  MNIST!! digits  "), "mnist-digits");
        assert_eq!(slugify("résumé model"), "r-sum-model");
    }

    #[test]
    fn slugify_never_empty() {
        assert_eq!(slugify(""), "model");
        assert_eq!(slugify("!!!"), "model");
    }

    #[test]
    fn generated_slugs_are_unique_for_same_name() {
        let a = generate_slug("house price");
        let b = generate_slug("house price");
        assert!(a.starts_with("house-price-"));
        assert_ne!(a, b);
        let suffix = a.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn api_key_shape() {
        let key = generate_api_key();
        assert!(key.starts_with(API_KEY_PREFIX));
        assert_eq!(key.len(), API_KEY_PREFIX.len() + API_KEY_BYTES * 2);
        assert_ne!(generate_api_key(), generate_api_key());
    }
}
