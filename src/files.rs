//! Document library and photo uploads.
//!
//! Object-store I/O is async and runs without the database lock: metadata
//! checks and writes each take the lock for one short synchronous step.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::access::{authorize, ensure_owner_or_admin, scoped_resident, visible_to, Action, Actor, Entity};
use crate::core_state::CoreState;
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{FilePatch, FileRecord, NewFileMeta, ProfilePatch, Resident, ResidentPatch, User};
use crate::storage::{content_type_for, is_image, object_key, viewer_url};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Raw bytes of an uploaded file with the name the client gave it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    fn check_size(&self) -> ServiceResult<()> {
        if self.bytes.is_empty() {
            return Err(ServiceError::validation("Uploaded file is empty"));
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ServiceError::validation(format!(
                "Uploaded file exceeds {} MB",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }
        Ok(())
    }
}

/// Whether a resident or family actor may see a file. Files not tied to a
/// resident are visible to any role in `roles_allowed`.
fn in_scope(file: &FileRecord, scope: Option<Uuid>) -> bool {
    match (scope, file.resident_id) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(own), Some(resident)) => own == resident,
    }
}

fn load_file(conn: &Connection, id: &Uuid) -> ServiceResult<FileRecord> {
    repository::get_file(conn, id)?.ok_or_else(|| ServiceError::not_found("File"))
}

// ═══════════════════════════════════════════
// Documents
// ═══════════════════════════════════════════

/// Store a document and record its metadata.
///
/// Images are linked directly; anything else is linked through the
/// embedded document viewer.
pub async fn upload_file(
    core: &CoreState,
    actor: &Actor,
    meta: NewFileMeta,
    upload: Upload,
    now: DateTime<Utc>,
) -> ServiceResult<FileRecord> {
    authorize(actor, Entity::File, Action::Create)?;
    let title = meta.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::validation("Title is required"));
    }
    upload.check_size()?;
    if let Some(resident_id) = &meta.resident_id {
        let conn = core.db()?;
        if repository::get_resident(&conn, resident_id)?.is_none() {
            return Err(ServiceError::validation("Resident does not exist"));
        }
    }

    let content_type = content_type_for(&upload.file_name);
    let key = object_key("files", &upload.file_name);
    let storage_url = core.storage.put(&key, upload.bytes, &content_type).await?;
    let url = if is_image(&content_type) {
        storage_url.clone()
    } else {
        viewer_url(&core.config.viewer_url, &storage_url)?
    };

    let record = FileRecord {
        id: Uuid::new_v4(),
        title,
        file_type: meta.file_type.unwrap_or(content_type),
        url,
        storage_url,
        resident_id: meta.resident_id,
        uploaded_by: actor.id,
        roles_allowed: meta.roles_allowed,
        notes: meta.notes,
        created_at: now,
        updated_at: now,
    };
    let inserted = {
        let conn = core.db()?;
        repository::insert_file(&conn, &record)
    };
    if let Err(e) = inserted {
        if let Err(cleanup) = core.storage.remove(&record.storage_url).await {
            tracing::warn!(url = %record.storage_url, error = %cleanup, "Orphaned object after failed insert");
        }
        return Err(e.into());
    }

    tracing::info!(file_id = %record.id, uploaded_by = %actor.id, "File uploaded");
    Ok(record)
}

/// Files the actor's role may see, optionally for one resident.
pub fn list_files(conn: &Connection, actor: &Actor, resident_id: Option<Uuid>) -> ServiceResult<Vec<FileRecord>> {
    authorize(actor, Entity::File, Action::Read)?;
    let scope = scoped_resident(conn, actor)?;
    if let (Some(own), Some(requested)) = (scope, resident_id) {
        if own != requested {
            return Err(ServiceError::forbidden("no access to this resident"));
        }
    }
    Ok(repository::list_files(conn, resident_id.as_ref())?
        .into_iter()
        .filter(|f| visible_to(&f.roles_allowed, actor.role) && in_scope(f, scope))
        .collect())
}

pub fn get_file(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<FileRecord> {
    authorize(actor, Entity::File, Action::Read)?;
    let file = load_file(conn, id)?;
    if !visible_to(&file.roles_allowed, actor.role) || !in_scope(&file, scoped_resident(conn, actor)?) {
        return Err(ServiceError::forbidden("file not available to you"));
    }
    Ok(file)
}

/// Metadata edit by the uploader or an admin.
pub fn update_file(conn: &Connection, actor: &Actor, id: &Uuid, patch: FilePatch, now: DateTime<Utc>) -> ServiceResult<FileRecord> {
    authorize(actor, Entity::File, Action::Update)?;
    let mut file = load_file(conn, id)?;
    ensure_owner_or_admin(actor, file.uploaded_by, "file")?;
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ServiceError::validation("Title is required"));
    }
    if let Some(resident_id) = &patch.resident_id {
        if repository::get_resident(conn, resident_id)?.is_none() {
            return Err(ServiceError::validation("Resident does not exist"));
        }
    }
    patch.apply(&mut file);
    file.updated_at = now;
    repository::update_file(conn, &file)?;
    Ok(file)
}

/// Remove the stored object, then the record.
pub async fn delete_file(core: &CoreState, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::File, Action::Delete)?;
    let file = {
        let conn = core.db()?;
        let file = load_file(&conn, id)?;
        ensure_owner_or_admin(actor, file.uploaded_by, "file")?;
        file
    };
    core.storage.remove(&file.storage_url).await?;
    {
        let conn = core.db()?;
        repository::delete_file(&conn, id)?;
    }
    tracing::info!(file_id = %id, deleted_by = %actor.id, "File deleted");
    Ok(())
}

// ═══════════════════════════════════════════
// Photos
// ═══════════════════════════════════════════

async fn store_photo(core: &CoreState, folder: &str, upload: Upload) -> ServiceResult<String> {
    upload.check_size()?;
    let content_type = content_type_for(&upload.file_name);
    if !is_image(&content_type) {
        return Err(ServiceError::validation("Photo must be an image"));
    }
    let key = object_key(folder, &upload.file_name);
    Ok(core.storage.put(&key, upload.bytes, &content_type).await?)
}

/// Replace the caller's own profile picture.
pub async fn set_profile_picture(core: &CoreState, actor: &Actor, upload: Upload, now: DateTime<Utc>) -> ServiceResult<User> {
    let url = store_photo(core, "profiles", upload).await?;
    let (user, previous) = {
        let conn = core.db()?;
        let previous = crate::auth::me(&conn, actor)?.profile_picture;
        let patch = ProfilePatch {
            profile_picture: Some(url),
            ..Default::default()
        };
        (crate::auth::update_profile(&conn, actor, patch, now)?, previous)
    };
    if let Some(old) = previous {
        if let Err(e) = core.storage.remove(&old).await {
            tracing::warn!(url = %old, error = %e, "Previous profile picture not removed");
        }
    }
    Ok(user)
}

/// Replace a resident's photo. Admin only.
pub async fn set_resident_photo(
    core: &CoreState,
    actor: &Actor,
    resident_id: &Uuid,
    upload: Upload,
    now: DateTime<Utc>,
) -> ServiceResult<Resident> {
    authorize(actor, Entity::Resident, Action::Update)?;
    let previous = {
        let conn = core.db()?;
        repository::get_resident(&conn, resident_id)?
            .ok_or_else(|| ServiceError::not_found("Resident"))?
            .photo_url
    };
    let url = store_photo(core, "residents", upload).await?;
    let resident = {
        let conn = core.db()?;
        let patch = ResidentPatch {
            photo_url: Some(url),
            ..Default::default()
        };
        crate::residents::update_resident(&conn, actor, resident_id, patch, now)?
    };
    if let Some(old) = previous {
        if let Err(e) = core.storage.remove(&old).await {
            tracing::warn!(url = %old, error = %e, "Previous resident photo not removed");
        }
    }
    Ok(resident)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_state::tests::test_state;
    use crate::db::repository::fixtures::{seed_resident, seed_user};
    use crate::models::enums::Role;

    fn actor(core: &CoreState, role: Role) -> Actor {
        let user = seed_user(&core.db().unwrap(), role);
        Actor::new(user.id, user.role)
    }

    fn meta(title: &str, roles: Vec<Role>) -> NewFileMeta {
        NewFileMeta {
            title: title.into(),
            roles_allowed: roles,
            ..Default::default()
        }
    }

    fn pdf() -> Upload {
        Upload {
            file_name: "plan.pdf".into(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    #[tokio::test]
    async fn non_image_uploads_are_viewer_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = test_state(dir.path());
        core.config.viewer_url = "https://viewer.example.com/view".into();
        let nurse = actor(&core, Role::Nurse);

        let doc = upload_file(&core, &nurse, meta("Care plan", vec![Role::Nurse]), pdf(), Utc::now())
            .await
            .unwrap();
        assert_eq!(doc.file_type, "application/pdf");
        assert!(doc.url.starts_with("https://viewer.example.com/view?url=http"));
        assert!(doc.url.ends_with("embedded=true"));
        assert!(doc.storage_url.starts_with("http://media.test/files/"));

        let photo = upload_file(
            &core,
            &nurse,
            meta("Wound photo", vec![Role::Nurse]),
            Upload {
                file_name: "wound.jpg".into(),
                bytes: vec![0xFF, 0xD8, 0xFF],
            },
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(photo.url, photo.storage_url);
    }

    #[tokio::test]
    async fn documents_use_default_viewer() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_state(dir.path());
        let nurse = actor(&core, Role::Nurse);

        let doc = upload_file(&core, &nurse, meta("Care plan", vec![Role::Nurse]), pdf(), Utc::now())
            .await
            .unwrap();
        assert_ne!(doc.url, doc.storage_url);
        assert!(doc.url.starts_with("https://docs.google.com/viewer?url="));
        assert!(doc.url.contains("embedded=true"));
    }

    #[tokio::test]
    async fn empty_and_oversized_uploads_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_state(dir.path());
        let nurse = actor(&core, Role::Nurse);
        let empty = Upload {
            file_name: "x.pdf".into(),
            bytes: vec![],
        };
        assert!(matches!(
            upload_file(&core, &nurse, meta("x", vec![]), empty, Utc::now()).await,
            Err(ServiceError::Validation(_))
        ));
        let huge = Upload {
            file_name: "x.pdf".into(),
            bytes: vec![0; MAX_UPLOAD_BYTES + 1],
        };
        assert!(matches!(
            upload_file(&core, &nurse, meta("x", vec![]), huge, Utc::now()).await,
            Err(ServiceError::Validation(_))
        ));
        let carer = actor(&core, Role::Carer);
        assert!(matches!(
            upload_file(&core, &carer, meta("x", vec![]), pdf(), Utc::now()).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn listing_is_post_filtered_by_role() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_state(dir.path());
        let nurse = actor(&core, Role::Nurse);
        let carer = actor(&core, Role::Carer);
        let admin = actor(&core, Role::Admin);
        upload_file(&core, &nurse, meta("Nurses only", vec![Role::Nurse]), pdf(), Utc::now())
            .await
            .unwrap();
        upload_file(&core, &nurse, meta("Everyone", vec![Role::Nurse, Role::Carer]), pdf(), Utc::now())
            .await
            .unwrap();

        let conn = core.db().unwrap();
        assert_eq!(list_files(&conn, &carer, None).unwrap().len(), 1);
        assert_eq!(list_files(&conn, &nurse, None).unwrap().len(), 2);
        assert_eq!(list_files(&conn, &admin, None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_object_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_state(dir.path());
        let nurse = actor(&core, Role::Nurse);
        let other = actor(&core, Role::Nurse);
        let doc = upload_file(&core, &nurse, meta("Chart", vec![Role::Nurse]), pdf(), Utc::now())
            .await
            .unwrap();
        let key = doc.storage_url.strip_prefix("http://media.test/").unwrap().to_string();
        assert!(dir.path().join(&key).exists());

        assert!(matches!(
            delete_file(&core, &other, &doc.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        delete_file(&core, &nurse, &doc.id).await.unwrap();
        assert!(!dir.path().join(&key).exists());
        assert!(repository::get_file(&core.db().unwrap(), &doc.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn resident_photo_must_be_image() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_state(dir.path());
        let admin = actor(&core, Role::Admin);
        let resident = seed_resident(&core.db().unwrap(), "Ada");

        assert!(matches!(
            set_resident_photo(&core, &admin, &resident.id, pdf(), Utc::now()).await,
            Err(ServiceError::Validation(_))
        ));
        let photo = Upload {
            file_name: "ada.png".into(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        };
        let updated = set_resident_photo(&core, &admin, &resident.id, photo, Utc::now()).await.unwrap();
        assert!(updated.photo_url.unwrap().starts_with("http://media.test/residents/"));
    }
}
