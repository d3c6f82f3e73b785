//! HTTP-01 challenge delivery via an object-storage bucket. Ported from
//! `cmd/certbus/http01solvers3bucket.go`'s `bucketChallengeUploader`: writes
//! `acme-challenge/<token>` with the key authorization as body; deletes on
//! cleanup. The bucket is expected to carry a short-TTL auto-delete lifecycle
//! rule as a safety net, so cleanup failures here are logged, not propagated
//! as fatal by the caller.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{ChallengeKind, ChallengeProvider};

pub struct S3Http01Provider {
    client: Client,
    bucket: String,
}

impl S3Http01Provider {
    pub async fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .load()
            .await;
        S3Http01Provider {
            client: Client::new(&sdk_config),
            bucket: bucket.into(),
        }
    }

    fn object_key(token: &str) -> String {
        format!("acme-challenge/{token}")
    }
}

#[async_trait]
impl ChallengeProvider for S3Http01Provider {
    async fn present(
        &self,
        _domain: &str,
        token: &str,
        key_authorization: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(Self::object_key(token))
            .body(ByteStream::from(key_authorization.as_bytes().to_vec()))
            .send()
            .await?;
        Ok(())
    }

    async fn cleanup(
        &self,
        _domain: &str,
        token: &str,
        _key_authorization: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(Self::object_key(token))
            .send()
            .await?;
        Ok(())
    }

    fn challenge_kind(&self) -> ChallengeKind {
        ChallengeKind::Http01
    }
}
