use ethers::types::{H160, H256};

pub fn h160_to_string(h160: &H160) -> String {
    format!("{h160:#x}")
}

pub fn h256_to_string(h256: &H256) -> String {
    format!("{h256:#x}")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn renders_lowercase_prefixed_hex() {
        let h160 = H160::from_str("0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D").unwrap();

        assert_eq!(
            h160_to_string(&h160),
            "0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d"
        );
    }

    #[test]
    fn renders_full_width_h256() {
        let h256 = H256::from_low_u64_be(0x67d);

        assert_eq!(h256_to_string(&h256).len(), 66);
        assert!(h256_to_string(&h256).ends_with("67d"));
    }
}
