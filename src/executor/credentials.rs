use rand::seq::SliceRandom;
use rand::Rng;

const PASSWORD_LENGTH: usize = 32;

/// Characters the target service rejects in admin passwords.
const FORBIDDEN: &[u8] = b"/@\"'\\ ";

fn alphabet() -> Vec<u8> {
    (0x21u8..=0x7e).filter(|c| !FORBIDDEN.contains(c)).collect()
}

/// Generate a temporary admin password for a new namespace.
///
/// Printable ASCII without `/ @ " ' \` or space, with at least one uppercase
/// letter, one lowercase letter and one digit.
pub fn generate_admin_password() -> String {
    let alphabet = alphabet();
    let mut rng = rand::thread_rng();

    let mut chars: Vec<u8> = vec![
        rng.gen_range(b'A'..=b'Z'),
        rng.gen_range(b'a'..=b'z'),
        rng.gen_range(b'0'..=b'9'),
    ];
    while chars.len() < PASSWORD_LENGTH {
        if let Some(c) = alphabet.choose(&mut rng) {
            chars.push(*c);
        }
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_meets_character_rules() {
        for _ in 0..200 {
            let pw = generate_admin_password();
            assert_eq!(pw.len(), 32);
            assert!(pw.chars().any(|c| c.is_ascii_uppercase()));
            assert!(pw.chars().any(|c| c.is_ascii_lowercase()));
            assert!(pw.chars().any(|c| c.is_ascii_digit()));
            assert!(pw.chars().all(|c| c.is_ascii_graphic()));
            for bad in ['/', '@', '"', '\'', '\\', ' '] {
                assert!(!pw.contains(bad), "password contains {bad:?}");
            }
        }
    }

    #[test]
    fn passwords_differ() {
        assert_ne!(generate_admin_password(), generate_admin_password());
    }
}
