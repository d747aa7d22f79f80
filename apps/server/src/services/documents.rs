//! Moves inline base64 files out of bundles and into the documents store

use crate::auth::AuthContext;
use crate::clients::DocumentStore;
use crate::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crvs_models::{Attachment, Bundle, ExtensionUrl, ExtensionValue, Resource};

/// Task extensions that hold hand-written signatures
const SIGNATURE_EXTENSIONS: [ExtensionUrl; 5] = [
    ExtensionUrl::InformantsSignature,
    ExtensionUrl::GroomSignature,
    ExtensionUrl::BrideSignature,
    ExtensionUrl::WitnessOneSignature,
    ExtensionUrl::WitnessTwoSignature,
];

/// `data:<mime>;base64,<payload>` with a payload that decodes
pub fn is_base64_file_string(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("data:") else {
        return false;
    };
    let Some((mime, payload)) = rest.split_once(";base64,") else {
        return false;
    };
    !mime.is_empty() && !payload.is_empty() && STANDARD.decode(payload).is_ok()
}

/// Swap inline attachment data for its stored reference
async fn upload_attachment(
    attachment: &mut Attachment,
    bearer: &str,
    documents: &dyn DocumentStore,
) -> Result<bool> {
    let Some(data) = attachment.data.clone().filter(|d| is_base64_file_string(d)) else {
        return Ok(false);
    };
    attachment.data = Some(documents.upload(&data, bearer).await?);
    Ok(true)
}

/// Upload every inline file in the bundle and replace it with the stored reference.
///
/// Covers document attachments, patient photos (certificate collectors) and
/// the signature extensions on the Task. Returns how many files were uploaded.
pub async fn upload_base64_attachments(
    bundle: &mut Bundle,
    auth: &AuthContext,
    documents: &dyn DocumentStore,
) -> Result<usize> {
    let bearer = auth.bearer();
    let mut uploaded = 0;

    for resource in bundle.resources_mut() {
        match resource {
            Resource::DocumentReference(doc) => {
                for content in &mut doc.content {
                    if upload_attachment(&mut content.attachment, &bearer, documents).await? {
                        uploaded += 1;
                    }
                }
            }
            Resource::Patient(patient) => {
                for photo in &mut patient.photo {
                    if upload_attachment(photo, &bearer, documents).await? {
                        uploaded += 1;
                    }
                }
            }
            Resource::Task(task) => {
                for url in SIGNATURE_EXTENSIONS {
                    let Some(ext) = task.extension.find_mut(url.url()) else {
                        continue;
                    };
                    let data = match &ext.value {
                        ExtensionValue::String(s) if is_base64_file_string(s) => s.clone(),
                        _ => continue,
                    };
                    ext.value = ExtensionValue::String(documents.upload(&data, &bearer).await?);
                    uploaded += 1;
                }
            }
            _ => {}
        }
    }

    if uploaded > 0 {
        tracing::info!(uploaded, "Uploaded inline documents");
    }
    Ok(uploaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenPayload;
    use async_trait::async_trait;
    use crvs_models::{DocumentContent, DocumentReference, Extension, Task};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentStore for Recorder {
        async fn upload(&self, file_data: &str, bearer: &str) -> Result<String> {
            assert_eq!(bearer, "Bearer t");
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push(file_data.to_string());
            Ok(format!("/ocrvs/{}.png", uploads.len()))
        }
    }

    const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn recognises_data_uris() {
        assert!(is_base64_file_string(PNG));
        assert!(!is_base64_file_string("/ocrvs/already-uploaded.png"));
        assert!(!is_base64_file_string("data:image/png;base64,"));
        assert!(!is_base64_file_string("data:image/png;base64,@@not base64@@"));
        assert!(!is_base64_file_string("data:;base64,iVBORw0KGgo="));
    }

    #[tokio::test]
    async fn replaces_attachments_and_signatures() {
        let mut task = Task::new();
        task.extension
            .upsert(Extension::string(ExtensionUrl::InformantsSignature, PNG));
        task.extension
            .upsert(Extension::string(ExtensionUrl::BrideSignature, "/ocrvs/old.png"));

        let doc = DocumentReference {
            content: vec![DocumentContent {
                attachment: Attachment {
                    content_type: Some("image/png".into()),
                    data: Some(PNG.into()),
                    ..Default::default()
                },
            }],
            ..Default::default()
        };

        let mut bundle = Bundle::new("document");
        bundle.push(None, task);
        bundle.push(None, Resource::DocumentReference(doc));
        crate::services::locator::select_or_create_collector(&mut bundle)
            .unwrap()
            .photo = vec![Attachment {
            content_type: Some("image/png".into()),
            data: Some(PNG.into()),
            ..Default::default()
        }];

        let store = Recorder::default();
        let auth = AuthContext {
            token: "t".into(),
            payload: TokenPayload::default(),
        };
        let uploaded = upload_base64_attachments(&mut bundle, &auth, &store).await.unwrap();

        assert_eq!(uploaded, 3);
        let task = bundle.entry[0].resource.as_ref().unwrap().as_task().unwrap();
        let signature = task
            .extension
            .find(ExtensionUrl::InformantsSignature.url())
            .and_then(Extension::value_string);
        assert_eq!(signature, Some("/ocrvs/1.png"));
        assert_eq!(
            task.extension
                .find(ExtensionUrl::BrideSignature.url())
                .and_then(Extension::value_string),
            Some("/ocrvs/old.png")
        );
        let Some(Resource::DocumentReference(doc)) = &bundle.entry[1].resource else {
            panic!("expected a DocumentReference");
        };
        assert_eq!(doc.content[0].attachment.data.as_deref(), Some("/ocrvs/2.png"));
        let collector = bundle.entry[2].resource.as_ref().unwrap().as_patient().unwrap();
        assert_eq!(collector.photo[0].data.as_deref(), Some("/ocrvs/3.png"));
    }
}
