//! Mapping transport failures onto catalog errors

use std::future::Future;

use media_endpoint::{CancellationToken, CatalogError};
use soap_client::SoapError;

/// A SOAP fault means the device understood and refused the request
pub(crate) fn from_soap(error: SoapError) -> CatalogError {
    match error {
        SoapError::Network(message) => CatalogError::Transport(message),
        SoapError::Parse(message) => CatalogError::Protocol(message),
        SoapError::Fault(code) => CatalogError::Protocol(format!("UPnP error {code}")),
    }
}

pub(crate) fn from_http(error: reqwest::Error) -> CatalogError {
    CatalogError::Transport(error.to_string())
}

pub(crate) fn from_json(error: serde_json::Error) -> CatalogError {
    CatalogError::Protocol(error.to_string())
}

/// Drive `request` until it finishes or `cancel` fires
pub(crate) async fn until_cancelled<T, F>(
    cancel: &CancellationToken,
    request: F,
) -> Result<T, CatalogError>
where
    F: Future<Output = Result<T, CatalogError>>,
{
    if cancel.is_cancelled() {
        return Err(CatalogError::Canceled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CatalogError::Canceled),
        result = request => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soap_errors_map_to_catalog_errors() {
        assert_eq!(
            from_soap(SoapError::Network("refused".into())),
            CatalogError::Transport("refused".into())
        );
        assert_eq!(
            from_soap(SoapError::Parse("bad xml".into())),
            CatalogError::Protocol("bad xml".into())
        );
        assert_eq!(
            from_soap(SoapError::Fault(701)),
            CatalogError::Protocol("UPnP error 701".into())
        );
    }

    #[tokio::test]
    async fn test_until_cancelled_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = until_cancelled(&cancel, async { Ok::<_, CatalogError>(1) }).await;
        assert_eq!(result, Err(CatalogError::Canceled));
    }

    #[tokio::test]
    async fn test_until_cancelled_interrupts_pending_request() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = until_cancelled(&cancel, std::future::pending()).await;
        assert_eq!(result, Err(CatalogError::Canceled));
    }

    #[tokio::test]
    async fn test_until_cancelled_passes_result_through() {
        let cancel = CancellationToken::new();
        let result = until_cancelled(&cancel, async {
            Err::<(), _>(CatalogError::Protocol("oops".into()))
        })
        .await;
        assert_eq!(result, Err(CatalogError::Protocol("oops".into())));
    }
}
