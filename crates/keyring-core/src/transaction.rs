//! Legacy (EIP-155) transactions
//!
//! Sources sign the keccak256 digest of the RLP payload
//! `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`. Hardware
//! devices receive that same payload and return `v`, `r`, `s`, which are
//! attached here and verified locally before a signed transaction is handed
//! back to the caller.

use crate::address::Address;
use crate::encoding::{decode_hex, decode_hex_fixed, serde_hex, serde_word, trim_leading_zeros};
use crate::keys::{keccak256, PrivateKey, RecoverableSignature};
use crate::{Error, Result};
use rlp::RlpStream;
use serde::{Deserialize, Serialize};

/// Transaction signature fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    /// EIP-155 `v` (`chainId * 2 + 35 + recoveryId`)
    pub v: u64,
    /// r scalar
    #[serde(with = "serde_word")]
    pub r: [u8; 32],
    /// s scalar
    #[serde(with = "serde_word")]
    pub s: [u8; 32],
}

/// Legacy transaction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Sender nonce
    pub nonce: u64,
    /// Gas price in wei
    pub gas_price: u128,
    /// Gas limit
    pub gas_limit: u64,
    /// Recipient; `None` creates a contract
    #[serde(default)]
    pub to: Option<Address>,
    /// Value in wei
    pub value: u128,
    /// Call data
    #[serde(default, with = "serde_hex")]
    pub data: Vec<u8>,
    /// Chain id (replay protection)
    pub chain_id: u64,
    /// Signature, once signed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<TransactionSignature>,
}

fn append_uint(stream: &mut RlpStream, big_endian: &[u8]) {
    stream.append(&trim_leading_zeros(big_endian).to_vec());
}

impl Transaction {
    fn append_body(&self, stream: &mut RlpStream) {
        append_uint(stream, &self.nonce.to_be_bytes());
        append_uint(stream, &self.gas_price.to_be_bytes());
        append_uint(stream, &self.gas_limit.to_be_bytes());
        match &self.to {
            Some(to) => {
                stream.append(&to.as_bytes().to_vec());
            }
            None => {
                stream.append_empty_data();
            }
        }
        append_uint(stream, &self.value.to_be_bytes());
        stream.append(&self.data);
    }

    /// RLP payload that is hashed for signing (and sent to hardware devices)
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        append_uint(&mut stream, &self.chain_id.to_be_bytes());
        stream.append_empty_data();
        stream.append_empty_data();
        stream.out().to_vec()
    }

    /// keccak256 of the signing payload
    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    fn v_base(&self) -> u64 {
        self.chain_id * 2 + 35
    }

    /// Sign in place with an in-memory key
    pub fn sign(&mut self, key: &PrivateKey) -> Result<()> {
        let signature = key.sign_prehash(&self.signing_hash())?;
        self.signature = Some(TransactionSignature {
            v: self.v_base() + u64::from(signature.recovery_id),
            r: signature.r,
            s: signature.s,
        });
        Ok(())
    }

    /// Attach `v`, `r`, `s` as hex strings reported by a device.
    ///
    /// Devices may report only the low byte of `v` for large chain ids; the
    /// full EIP-155 value is reconstructed from the chain id.
    pub fn apply_device_signature(&mut self, v: &str, r: &str, s: &str) -> Result<()> {
        let v_bytes = decode_hex(v)?;
        let v_raw = decode_hex_fixed::<8>(v).map(u64::from_be_bytes).map_err(|_| {
            Error::InvalidTransaction(format!("Device returned oversized v ({} bytes)", v_bytes.len()))
        })?;
        let recovery_id = self.recovery_id_for(v_raw)?;

        self.signature = Some(TransactionSignature {
            v: self.v_base() + u64::from(recovery_id),
            r: decode_hex_fixed::<32>(r)?,
            s: decode_hex_fixed::<32>(s)?,
        });
        Ok(())
    }

    fn recovery_id_for(&self, v: u64) -> Result<u8> {
        if v == 27 || v == 28 {
            return Ok((v - 27) as u8);
        }
        let base = self.v_base();
        if v >= base && v - base <= 1 {
            return Ok((v - base) as u8);
        }
        if v <= 0xff {
            for recovery_id in 0..=1u64 {
                if (base + recovery_id) & 0xff == v {
                    return Ok(recovery_id as u8);
                }
            }
        }
        Err(Error::InvalidTransaction(format!(
            "v={v} does not match chain id {}",
            self.chain_id
        )))
    }

    /// Address that produced the attached signature
    pub fn recover_signer(&self) -> Result<Address> {
        let signature = self
            .signature
            .ok_or_else(|| Error::InvalidTransaction("Transaction is not signed".to_string()))?;
        let recoverable = RecoverableSignature {
            r: signature.r,
            s: signature.s,
            recovery_id: self.recovery_id_for(signature.v)?,
        };
        recoverable.recover(&self.signing_hash())
    }

    /// Check that the attached signature was produced by `expected`
    pub fn verify_signature(&self, expected: &Address) -> Result<()> {
        let signer = self.recover_signer()?;
        if &signer != expected {
            return Err(Error::SignatureVerification(format!(
                "Transaction signed by {signer}, expected {expected}"
            )));
        }
        Ok(())
    }

    /// RLP encoding of the signed transaction
    pub fn encode_signed(&self) -> Result<Vec<u8>> {
        let signature = self
            .signature
            .ok_or_else(|| Error::InvalidTransaction("Transaction is not signed".to_string()))?;
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        append_uint(&mut stream, &signature.v.to_be_bytes());
        append_uint(&mut stream, &signature.r);
        append_uint(&mut stream, &signature.s);
        Ok(stream.out().to_vec())
    }

    /// Transaction hash (keccak256 of the signed encoding)
    pub fn hash(&self) -> Result<[u8; 32]> {
        Ok(keccak256(&self.encode_signed()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eip155_example() -> Transaction {
        Transaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Some(Address::parse("0x3535353535353535353535353535353535353535").unwrap()),
            value: 1_000_000_000_000_000_000,
            data: Vec::new(),
            chain_id: 1,
            signature: None,
        }
    }

    #[test]
    fn test_eip155_signing_payload() {
        // Reference vector from EIP-155
        let tx = eip155_example();
        assert_eq!(
            hex::encode(tx.signing_payload()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(tx.signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signature() {
        let key = PrivateKey::from_hex(
            "0x4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        let mut tx = eip155_example();
        tx.sign(&key).unwrap();

        let signature = tx.signature.unwrap();
        assert_eq!(signature.v, 37);
        assert_eq!(
            hex::encode(tx.encode_signed().unwrap()),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
        tx.verify_signature(&key.address()).unwrap();
    }

    #[test]
    fn test_device_signature_with_truncated_v() {
        let key = PrivateKey::generate();
        let mut signed = eip155_example();
        signed.chain_id = 1_000;
        signed.sign(&key).unwrap();
        let reference = signed.signature.unwrap();

        let mut tx = signed.clone();
        tx.signature = None;
        let low_byte = format!("{:02x}", reference.v & 0xff);
        tx.apply_device_signature(&low_byte, &hex::encode(reference.r), &hex::encode(reference.s))
            .unwrap();
        assert_eq!(tx.signature.unwrap().v, reference.v);
        tx.verify_signature(&key.address()).unwrap();
    }

    #[test]
    fn test_verify_rejects_other_signer() {
        let key = PrivateKey::generate();
        let other = PrivateKey::generate();
        let mut tx = eip155_example();
        tx.sign(&key).unwrap();
        assert!(matches!(
            tx.verify_signature(&other.address()),
            Err(Error::SignatureVerification(_))
        ));
    }

    #[test]
    fn test_unsigned_transaction_cannot_encode() {
        assert!(eip155_example().encode_signed().is_err());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::json!({
            "nonce": 1,
            "gasPrice": 1000,
            "gasLimit": 21000,
            "to": "0x3535353535353535353535353535353535353535",
            "value": 5,
            "data": "0xdeadbeef",
            "chainId": 1
        });
        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.data, vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(tx.signature.is_none());
    }
}
