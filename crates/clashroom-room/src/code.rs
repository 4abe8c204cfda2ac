//! Room code generation.

use clashroom_protocol::RoomCode;
use rand::Rng;

/// Characters a room code is drawn from.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of a generated room code.
pub const CODE_LEN: usize = 6;

/// A random six character `[a-z0-9]` code. Uniqueness is the registry's
/// job.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    let code: String = (0..CODE_LEN)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect();
    RoomCode::new(code)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_generate_code_shape() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let code = generate_code(&mut rng);
            assert_eq!(code.as_str().len(), CODE_LEN);
            assert!(code
                .as_str()
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }
}
