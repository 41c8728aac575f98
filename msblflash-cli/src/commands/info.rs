//! Image info command implementation.

use {
    anyhow::{Context, Result},
    msblflash::{MsblImage, hex_upper, image::msbl::HEADER_SIZE},
    std::path::Path,
};

/// Show the header and layout of an MSBL image.
pub(crate) fn cmd_info(firmware: &Path, json: bool) -> Result<()> {
    let image = MsblImage::from_file(firmware)
        .with_context(|| format!("Failed to load {}", firmware.display()))?;

    if json {
        let output = serde_json::json!({
            "ok": true,
            "data": image_json(firmware, &image),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", image.describe());
    }
    Ok(())
}

fn image_json(firmware: &Path, image: &MsblImage) -> serde_json::Value {
    let header = image.header();
    serde_json::json!({
        "file": firmware.display().to_string(),
        "magic": header.magic_str(),
        "standard_magic": header.has_standard_magic(),
        "format_version": header.format_version,
        "target": header.target_name(),
        "encryption": header.encryption_type(),
        "num_pages": header.num_pages,
        "page_size": header.page_size,
        "page_payload_len": image.payload_len(),
        "crc_size": header.crc_size,
        "header_size": HEADER_SIZE,
        "nonce": hex_upper(image.nonce()),
        "auth": hex_upper(image.auth()),
        "crc32": image.trailer_crc32(),
    })
}
