//! Key - Derived once per session from the user's passphrase. Never persisted.
//!
//! passphrase → BIP39 seed (PBKDF2-HMAC-SHA512, 2048 rounds) → BIP32 master
//! → BIP84 account xpub (`m/84'/coin'/0'`), which is all the wallet engine sees.

use bip39::{Language, Mnemonic};
use bitcoin::bip32::{DerivationPath, Fingerprint, Xpriv, Xpub};
use bitcoin::secp256k1::Secp256k1;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::Network;
use crate::error::{Error, Result};

#[derive(Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct Key {
    seed: [u8; 64],
}

impl Key {
    /// Deterministic: the same phrase always yields the same key.
    ///
    /// Every word must be on the English BIP39 list and the word count must be
    /// valid. The checksum is not enforced, so phrases generated by picking
    /// random list words are accepted.
    pub fn from_passphrase(passphrase: &str) -> Result<Self> {
        let normalized = Zeroizing::new(passphrase.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase());
        let mnemonic = Mnemonic::parse_in_normalized_without_checksum_check(Language::English, &normalized)
            .map_err(|e| Error::InvalidPassphrase(e.to_string()))?;
        Ok(Self { seed: mnemonic.to_seed("") })
    }

    pub fn from_seed(seed: [u8; 64]) -> Self { Self { seed } }

    pub fn seed(&self) -> &[u8; 64] { &self.seed }

    pub fn master_xpriv(&self, network: Network) -> Result<Xpriv> {
        Xpriv::new_master(network.to_bitcoin(), &self.seed).map_err(|e| Error::KeyDerivation(e.to_string()))
    }

    /// BIP84 account-level public key for `network`.
    pub fn master_public_key(&self, network: Network) -> Result<MasterPubKey> {
        let secp = Secp256k1::new();
        let master = self.master_xpriv(network)?;
        let path = DerivationPath::from_str(&format!("m/84'/{}'/0'", network.coin_type()))
            .map_err(|e| Error::KeyDerivation(e.to_string()))?;
        let account = master.derive_priv(&secp, &path).map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(MasterPubKey {
            xpub: Xpub::from_priv(&secp, &account),
            fingerprint: master.fingerprint(&secp),
            path,
        })
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("Key(<redacted>)") }
}

/// Account xpub plus the origin the engine needs to build signable descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPubKey {
    pub xpub: Xpub,
    pub fingerprint: Fingerprint,
    pub path: DerivationPath,
}
