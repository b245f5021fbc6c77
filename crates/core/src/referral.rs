//! Referral code generation.
//!
//! A code is a short human-friendly prefix taken from the customer's name
//! followed by a random base-36 suffix, e.g. `JANE7K2Q`. Uniqueness is
//! best effort: the caller supplies an existence check and the generator
//! retries with fresh suffixes before falling back to a fully random code.

use std::future::Future;

use rand::Rng;

/// Alphabet for random code characters (uppercase base 36).
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Letters taken from the name or email.
const PREFIX_LENGTH: usize = 4;

/// Random characters appended to the prefix.
const SUFFIX_LENGTH: usize = 4;

/// Length of the fully random fallback code.
const FALLBACK_LENGTH: usize = 6;

/// Prefixed candidates tried before falling back.
pub const MAX_ATTEMPTS: usize = 10;

/// Prefix used when neither name nor email yields a letter.
const DEFAULT_PREFIX: &str = "REF";

/// Errors from [`generate_unique`].
#[derive(Debug, thiserror::Error)]
pub enum ReferralCodeError<E> {
    /// Every candidate, including the random fallback, was already taken.
    #[error("could not find an unused referral code after {attempts} attempts")]
    Exhausted {
        /// Candidates checked.
        attempts: usize,
    },
    /// The existence check failed.
    #[error("referral code lookup failed: {0}")]
    Lookup(E),
}

/// Build the code prefix from a first name, falling back to the email
/// local part.
///
/// ```
/// use canopy_core::referral::code_prefix;
///
/// assert_eq!(code_prefix(Some("Jo-anne"), "x@shop.ca"), "JOAN");
/// assert_eq!(code_prefix(None, "sam.lee@shop.ca"), "SAML");
/// assert_eq!(code_prefix(Some("李"), "42@shop.ca"), "REF");
/// ```
#[must_use]
pub fn code_prefix(first_name: Option<&str>, email: &str) -> String {
    let letters = |s: &str| -> String {
        s.chars()
            .filter(char::is_ascii_alphabetic)
            .take(PREFIX_LENGTH)
            .map(|c| c.to_ascii_uppercase())
            .collect()
    };

    let from_name = first_name.map(letters).unwrap_or_default();
    if !from_name.is_empty() {
        return from_name;
    }

    let local_part = email.split('@').next().unwrap_or_default();
    let from_email = letters(local_part);
    if from_email.is_empty() {
        DEFAULT_PREFIX.to_owned()
    } else {
        from_email
    }
}

/// Produce `len` random characters from the code alphabet.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            char::from(CODE_ALPHABET.get(idx).copied().unwrap_or(b'0'))
        })
        .collect()
}

/// Prefix plus a random four character suffix.
pub fn candidate<R: Rng + ?Sized>(rng: &mut R, prefix: &str) -> String {
    format!("{prefix}{}", random_code(rng, SUFFIX_LENGTH))
}

/// Generate a code that `exists` reports as unused.
///
/// Tries [`MAX_ATTEMPTS`] prefixed candidates, then one fully random
/// six-character code. `exists` is called once per candidate. Two callers
/// racing on the same candidate can still both see it as free; the unique
/// index on `users.referral_code` is the final arbiter.
///
/// # Errors
///
/// Returns [`ReferralCodeError::Lookup`] when `exists` fails and
/// [`ReferralCodeError::Exhausted`] when every candidate is taken.
pub async fn generate_unique<R, F, Fut, E>(
    rng: &mut R,
    prefix: &str,
    mut exists: F,
) -> Result<String, ReferralCodeError<E>>
where
    R: Rng + ?Sized,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    for _ in 0..MAX_ATTEMPTS {
        let code = candidate(rng, prefix);
        if !exists(code.clone()).await.map_err(ReferralCodeError::Lookup)? {
            return Ok(code);
        }
    }

    let fallback = random_code(rng, FALLBACK_LENGTH);
    if exists(fallback.clone())
        .await
        .map_err(ReferralCodeError::Lookup)?
    {
        return Err(ReferralCodeError::Exhausted {
            attempts: MAX_ATTEMPTS + 1,
        });
    }

    Ok(fallback)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::convert::Infallible;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_prefix_from_name_then_email() {
        assert_eq!(code_prefix(Some("alexandra"), "a@shop.ca"), "ALEX");
        assert_eq!(code_prefix(Some("Al"), "a@shop.ca"), "AL");
        assert_eq!(code_prefix(Some("  "), "kim_77@shop.ca"), "KIM");
        assert_eq!(code_prefix(None, "1234@shop.ca"), "REF");
    }

    #[test]
    fn test_candidate_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let code = candidate(&mut rng, "JANE");
        assert_eq!(code.len(), 8);
        assert!(code.starts_with("JANE"));
        assert!(
            code.chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[tokio::test]
    async fn test_returns_first_free_candidate() {
        let mut rng = StdRng::seed_from_u64(1);
        let code = generate_unique(&mut rng, "SAML", |_| async { Ok::<_, Infallible>(false) })
            .await
            .unwrap();
        assert!(code.starts_with("SAML"));
    }

    #[tokio::test]
    async fn test_never_returns_existing_code() {
        // Pre-compute the candidates a seeded generator will produce and mark
        // the first few as taken.
        let mut preview = StdRng::seed_from_u64(42);
        let taken: HashSet<String> = (0..3).map(|_| candidate(&mut preview, "JANE")).collect();

        let checked = RefCell::new(Vec::new());
        let mut rng = StdRng::seed_from_u64(42);
        let code = generate_unique(&mut rng, "JANE", |code| {
            checked.borrow_mut().push(code.clone());
            let hit = taken.contains(&code);
            async move { Ok::<_, Infallible>(hit) }
        })
        .await
        .unwrap();

        assert!(!taken.contains(&code));
        assert_eq!(checked.borrow().len(), 4);
    }

    #[tokio::test]
    async fn test_falls_back_to_random_code() {
        let mut rng = StdRng::seed_from_u64(3);
        let code = generate_unique(&mut rng, "JANE", |code| async move {
            Ok::<_, Infallible>(code.starts_with("JANE"))
        })
        .await
        .unwrap();
        assert_eq!(code.len(), 6);
    }

    #[tokio::test]
    async fn test_exhausted_when_everything_taken() {
        let mut rng = StdRng::seed_from_u64(9);
        let err = generate_unique(&mut rng, "JANE", |_| async { Ok::<_, Infallible>(true) })
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralCodeError::Exhausted { attempts: 11 }));
    }

    #[tokio::test]
    async fn test_lookup_error_propagates() {
        let mut rng = StdRng::seed_from_u64(9);
        let err = generate_unique(&mut rng, "JANE", |_| async { Err::<bool, _>("db down") })
            .await
            .unwrap_err();
        assert!(matches!(err, ReferralCodeError::Lookup("db down")));
    }
}
