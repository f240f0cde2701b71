use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use cadence_core::{
    AvailabilityStatus, EscalationRecipient, EscalationTarget, Program, Resource,
};
use cadence_store::{ProjectStore, StoreError};

/// Contact the PM-notify lookup resolved to. Synthetic fallback contacts
/// (org fallback email, ops email) carry no resource id.
#[derive(Debug, Clone)]
pub struct PmContact {
    pub resource_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub timezone: String,
}

fn recipient_from_resource(resource: &Resource, level: u8) -> EscalationRecipient {
    let today = Utc::now().date_naive();
    let is_available = resource.is_available_on(today);
    EscalationRecipient {
        resource_id: Some(resource.id),
        name: resource.name.clone(),
        email: resource.delivery_email().to_owned(),
        escalation_level: level,
        target: EscalationTarget::for_level(level),
        availability: resource.availability_status,
        is_available,
        skip_reason: None,
        timezone: resource.timezone.clone(),
        chat_user_id: resource.chat_user_id.clone(),
    }
}

/// Build the full escalation chain for a task owner.
///
/// Levels 0-2 come from the owner's record (self, backup, manager); level 3
/// is the PM resolved in order: program `pm_resource_id`, program
/// `secondary_pm_resource_id`, the org-settings `default_pm_resource_id`,
/// the org-settings `escalation_email_fallback` (synthetic), and finally
/// the configured ops fallback. When none of those resolve, the chain ends
/// at level 2.
pub async fn get_escalation_chain(
    store: &dyn ProjectStore,
    owner_id: Uuid,
    program: Option<&Program>,
    ops_fallback: Option<&PmContact>,
) -> Result<Vec<EscalationRecipient>, StoreError> {
    let Some(owner) = store.get_resource(owner_id).await? else {
        return Ok(Vec::new());
    };

    let mut chain = vec![recipient_from_resource(&owner, 0)];

    if let Some(backup_id) = owner.backup_resource_id
        && let Some(backup) = store.get_resource(backup_id).await?
    {
        chain.push(recipient_from_resource(&backup, 1));
    }

    if let Some(manager_id) = owner.manager_id
        && let Some(manager) = store.get_resource(manager_id).await?
    {
        chain.push(recipient_from_resource(&manager, 2));
    }

    if let Some(pm) = pm_for_notification(store, program, ops_fallback).await? {
        let recipient = match pm.resource_id {
            Some(id) => match store.get_resource(id).await? {
                Some(resource) => recipient_from_resource(&resource, 3),
                None => synthetic_recipient(&pm),
            },
            None => synthetic_recipient(&pm),
        };
        chain.push(recipient);
    }

    Ok(chain)
}

fn synthetic_recipient(pm: &PmContact) -> EscalationRecipient {
    EscalationRecipient {
        resource_id: pm.resource_id,
        name: pm.name.clone(),
        email: pm.email.clone(),
        escalation_level: 3,
        target: EscalationTarget::Pm,
        availability: AvailabilityStatus::Active,
        is_available: true,
        skip_reason: None,
        timezone: pm.timezone.clone(),
        chat_user_id: None,
    }
}

/// Walk the chain from `start_level`, skipping anyone not currently
/// available. Returns the first available recipient and everyone skipped on
/// the way (with reasons).
pub async fn find_available_recipient(
    store: &dyn ProjectStore,
    owner_id: Uuid,
    program: Option<&Program>,
    ops_fallback: Option<&PmContact>,
    start_level: u8,
) -> Result<(Option<EscalationRecipient>, Vec<EscalationRecipient>), StoreError> {
    let chain = get_escalation_chain(store, owner_id, program, ops_fallback).await?;
    let mut skipped = Vec::new();

    for recipient in chain {
        if recipient.escalation_level < start_level {
            continue;
        }
        if recipient.is_available {
            return Ok((Some(recipient), skipped));
        }
        let mut unavailable = recipient;
        unavailable.skip_reason = Some(format!("resource is {:?}", unavailable.availability));
        skipped.push(unavailable);
    }

    Ok((None, skipped))
}

/// The PM-notify lookup used both for level 3 of the chain and for direct
/// PM notifications (no-recipient escalation, approval requests, blockers).
pub async fn pm_for_notification(
    store: &dyn ProjectStore,
    program: Option<&Program>,
    ops_fallback: Option<&PmContact>,
) -> Result<Option<PmContact>, StoreError> {
    if let Some(program) = program {
        for candidate in [program.pm_resource_id, program.secondary_pm_resource_id] {
            let Some(id) = candidate else { continue };
            if let Some(resource) = store.get_resource(id).await? {
                return Ok(Some(PmContact {
                    resource_id: Some(resource.id),
                    name: resource.name.clone(),
                    email: resource.delivery_email().to_owned(),
                    timezone: resource.timezone.clone(),
                }));
            }
        }
    }

    if let Some(raw) = store.get_org_setting("default_pm_resource_id").await? {
        match raw.trim().parse::<Uuid>() {
            Ok(id) => {
                if let Some(resource) = store.get_resource(id).await? {
                    return Ok(Some(PmContact {
                        resource_id: Some(resource.id),
                        name: resource.name.clone(),
                        email: resource.delivery_email().to_owned(),
                        timezone: resource.timezone.clone(),
                    }));
                }
            }
            Err(_) => {
                warn!(value = %raw, "invalid default_pm_resource_id org setting");
            }
        }
    }

    if let Some(email) = store.get_org_setting("escalation_email_fallback").await?
        && email.contains('@')
    {
        return Ok(Some(PmContact {
            resource_id: None,
            name: "System Administrator".to_owned(),
            email,
            timezone: "UTC".to_owned(),
        }));
    }

    Ok(ops_fallback.cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::ExternalId;
    use cadence_store_memory::MemoryStore;

    async fn seed_resource(
        store: &MemoryStore,
        ext: &str,
        availability: AvailabilityStatus,
    ) -> Resource {
        let mut r = Resource::new(
            ExternalId::from(ext),
            format!("Resource {ext}"),
            format!("{}@example.com", ext.to_lowercase()),
        );
        r.availability_status = availability;
        store.insert_resource(r).await.unwrap()
    }

    #[tokio::test]
    async fn chain_is_owner_backup_manager_pm() {
        let store = MemoryStore::new();
        let manager = seed_resource(&store, "R-M", AvailabilityStatus::Active).await;
        let backup = seed_resource(&store, "R-B", AvailabilityStatus::Active).await;
        let pm = seed_resource(&store, "R-PM", AvailabilityStatus::Active).await;

        let mut owner = Resource::new(
            ExternalId::from("R-1"),
            "Owner",
            "owner@example.com",
        );
        owner.backup_resource_id = Some(backup.id);
        owner.manager_id = Some(manager.id);
        let owner = store.insert_resource(owner).await.unwrap();

        let mut program = Program::new(ExternalId::from("PROG-1"), "Launch");
        program.pm_resource_id = Some(pm.id);
        let program = store.insert_program(program).await.unwrap();

        let chain = get_escalation_chain(&store, owner.id, Some(&program), None)
            .await
            .unwrap();
        let levels: Vec<u8> = chain.iter().map(|r| r.escalation_level).collect();
        assert_eq!(levels, vec![0, 1, 2, 3]);
        assert_eq!(chain[3].target, EscalationTarget::Pm);
    }

    #[tokio::test]
    async fn unavailable_recipients_are_skipped_with_reasons() {
        let store = MemoryStore::new();
        let backup = seed_resource(&store, "R-B", AvailabilityStatus::Active).await;

        let mut owner = Resource::new(ExternalId::from("R-1"), "Owner", "owner@example.com");
        owner.availability_status = AvailabilityStatus::OnLeave;
        owner.backup_resource_id = Some(backup.id);
        let owner = store.insert_resource(owner).await.unwrap();

        let (found, skipped) = find_available_recipient(&store, owner.id, None, None, 0)
            .await
            .unwrap();
        let found = found.expect("backup should be found");
        assert_eq!(found.escalation_level, 1);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].skip_reason.as_deref().unwrap().contains("OnLeave"));
    }

    #[tokio::test]
    async fn nobody_available_returns_skip_list() {
        let store = MemoryStore::new();
        let mut owner = Resource::new(ExternalId::from("R-1"), "Owner", "owner@example.com");
        owner.availability_status = AvailabilityStatus::Unavailable;
        let owner = store.insert_resource(owner).await.unwrap();

        let (found, skipped) = find_available_recipient(&store, owner.id, None, None, 0)
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(skipped.len(), 1);
    }

    #[tokio::test]
    async fn pm_lookup_falls_through_to_org_settings_and_ops() {
        let store = MemoryStore::new();

        // Nothing configured at all.
        assert!(pm_for_notification(&store, None, None).await.unwrap().is_none());

        // Ops fallback.
        let ops = PmContact {
            resource_id: None,
            name: "Operations Team".to_owned(),
            email: "ops@example.com".to_owned(),
            timezone: "UTC".to_owned(),
        };
        let contact = pm_for_notification(&store, None, Some(&ops)).await.unwrap().unwrap();
        assert_eq!(contact.email, "ops@example.com");

        // Org fallback email beats ops config.
        store
            .set_org_setting("escalation_email_fallback", "admin@example.com")
            .await
            .unwrap();
        let contact = pm_for_notification(&store, None, Some(&ops)).await.unwrap().unwrap();
        assert_eq!(contact.email, "admin@example.com");

        // Org default PM beats the fallback email.
        let pm = seed_resource(&store, "R-PM", AvailabilityStatus::Active).await;
        store
            .set_org_setting("default_pm_resource_id", &pm.id.to_string())
            .await
            .unwrap();
        let contact = pm_for_notification(&store, None, Some(&ops)).await.unwrap().unwrap();
        assert_eq!(contact.resource_id, Some(pm.id));
    }
}
