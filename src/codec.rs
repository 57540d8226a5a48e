//! AddressCodec - address validation/decoding and payment QR images

use bitcoin::address::NetworkUnchecked;
use bitcoin::Address;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Luma};
use qrcode::{EcLevel, QrCode};

use crate::config::Network;
use crate::error::{Error, Result};

pub const PAYMENT_SCHEME: &str = "bitcoin";

/// True iff `address` parses and belongs to `network`.
pub fn validate(address: &str, network: Network) -> bool {
    decode_for_network(address, network).is_ok()
}

/// Fails closed: malformed or wrong-network input is an error, never coerced.
pub fn decode_for_network(raw: &str, network: Network) -> Result<Address> {
    let unchecked: Address<NetworkUnchecked> = raw
        .parse()
        .map_err(|e: bitcoin::address::ParseError| Error::InvalidAddress(format!("{}: {}", raw, e)))?;
    unchecked
        .require_network(network.to_bitcoin())
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", raw, e)))
}

pub fn payment_uri(address: &Address) -> String {
    format!("{}:{}", PAYMENT_SCHEME, address)
}

/// PNG of the payment URI at error-correction level M, at least `size_px` square.
/// Identical input gives byte-identical output.
pub fn encode_payment_image(address: &Address, size_px: u32) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(payment_uri(address).as_bytes(), EcLevel::M)
        .map_err(|e| Error::EncodingFailed(e.to_string()))?;
    let image = code.render::<Luma<u8>>().min_dimensions(size_px, size_px).build();

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::L8)
        .map_err(|e| Error::EncodingFailed(e.to_string()))?;
    Ok(png)
}
