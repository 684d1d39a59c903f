//! Request signing for the FreedomPay API.
//!
//! `pg_sig` is the MD5 hex digest of the script name, every parameter value in
//! key order, and the merchant secret, joined with `;`. The gateway computes the
//! same digest on its side, so this must stay bit-for-bit compatible.

use md5::{Digest, Md5};
use std::collections::BTreeMap;

const SEPARATOR: &str = ";";

/// Computes `pg_sig` for a request to `script_name`.
///
/// Parameters are ordered by key before signing, so the order they are supplied
/// in does not matter. `pg_sig` itself must not be among them.
pub fn build_signature<'a, I>(script_name: &str, params: I, secret: &str) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let sorted: BTreeMap<&str, &str> = params.into_iter().collect();

    let mut parts = Vec::with_capacity(sorted.len() + 2);
    parts.push(script_name);
    parts.extend(sorted.values().copied());
    parts.push(secret);

    format!("{:x}", Md5::digest(parts.join(SEPARATOR).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_signature_vector() {
        let sig = build_signature(
            "status_v2",
            [
                ("pg_merchant_id", "560521"),
                ("pg_order_id", "42"),
                ("pg_salt", "abc"),
            ],
            "secret",
        );
        assert_eq!(sig, "f2eaf6f4fb4fee02c4f893c70bae41d0");
    }

    #[test]
    fn test_init_signature_sorts_by_key() {
        let sig = build_signature(
            "init_payment.php",
            [
                ("pg_order_id", "7"),
                ("pg_merchant_id", "560521"),
                ("pg_amount", "15.00"),
                ("pg_description", "Payment for order #7"),
                ("pg_salt", "saltsalt"),
            ],
            "secret",
        );
        assert_eq!(sig, "d77d946ef780e715f0bfbe01d647685d");
    }

    #[test]
    fn test_signature_ignores_insertion_order() {
        let params = [
            ("pg_salt", "x1y2z3"),
            ("pg_amount", "99.90"),
            ("pg_order_id", "1001"),
            ("pg_merchant_id", "560521"),
        ];
        let expected = build_signature("init_payment.php", params, "k");

        let mut permuted = params.to_vec();
        for _ in 0..params.len() {
            permuted.rotate_left(1);
            assert_eq!(
                build_signature("init_payment.php", permuted.iter().copied(), "k"),
                expected
            );
            permuted.reverse();
            assert_eq!(
                build_signature("init_payment.php", permuted.iter().copied(), "k"),
                expected
            );
        }
    }

    #[test]
    fn test_no_params_signs_script_and_secret() {
        let sig = build_signature("status_v2", std::iter::empty(), "secret");
        assert_eq!(sig, "2474bff2e35a9b8481f35b9789ad53a7");
    }

    #[test]
    fn test_secret_changes_signature() {
        let params = [("pg_order_id", "1")];
        assert_ne!(
            build_signature("status_v2", params, "a"),
            build_signature("status_v2", params, "b")
        );
    }
}
