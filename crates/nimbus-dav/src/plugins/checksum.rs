//! `PATCH` with `X-Recalculate-Hash` recomputes a file checksum.

use async_trait::async_trait;
use http::StatusCode;
use sha2::{Digest, Sha256, Sha512};

use nimbus_entity::share::Permissions;

use crate::error::{DavError, DavResult};
use crate::server::{
    DavContext, DavRequest, DavResponse, DavServer, ServerPlugin, empty_response, set_header,
};

#[derive(Debug, Clone, Default)]
pub struct ChecksumUpdatePlugin;

/// `ALGORITHM:hexdigest` of `data`, `None` for unsupported algorithms.
pub fn checksum(algorithm: &str, data: &[u8]) -> Option<String> {
    let digest = match algorithm.to_ascii_lowercase().as_str() {
        "sha256" => hex(&Sha256::digest(data)),
        "sha512" => hex(&Sha512::digest(data)),
        _ => return None,
    };
    Some(format!("{}:{digest}", algorithm.to_ascii_uppercase()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl ServerPlugin for ChecksumUpdatePlugin {
    fn name(&self) -> &'static str {
        "checksum-update"
    }

    fn features(&self) -> Vec<&'static str> {
        vec!["nextcloud-checksum-update"]
    }

    fn methods(&self) -> Vec<&'static str> {
        vec!["PATCH"]
    }

    async fn handle_method(
        &self,
        _server: &DavServer,
        req: &DavRequest,
        ctx: &DavContext,
    ) -> DavResult<Option<DavResponse>> {
        if req.method.as_str() != "PATCH" {
            return Ok(None);
        }
        let Some(algorithm) = req.header("X-Recalculate-Hash") else {
            return Ok(None);
        };

        let view = ctx.view()?;
        let entry = view.require_entry(&req.path).await?;
        if entry.is_collection {
            return Err(DavError::bad_request("Checksums can only be computed for files"));
        }
        view.require(Permissions::UPDATE, "update this file")?;

        let data = view.read(&req.path).await?;
        let value = checksum(algorithm.trim(), &data).ok_or_else(|| {
            DavError::bad_request(format!("Unsupported hash algorithm \"{algorithm}\""))
        })?;

        let mut resp = empty_response(StatusCode::NO_CONTENT);
        set_header(&mut resp, "OC-Checksum", &value);
        Ok(Some(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        assert_eq!(
            checksum("sha256", b"abc").unwrap(),
            "SHA256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(checksum("SHA512", b"abc").unwrap().starts_with("SHA512:ddaf35a1"));
        assert!(checksum("md5", b"abc").is_none());
    }
}
