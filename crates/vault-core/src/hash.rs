use sha3::{Digest, Keccak256};

pub type Hash = [u8; 32];

pub fn keccak256(input: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
