//! Seed the demo database with generated leads

use anyhow::Result;
use lg_core::{CallStatus, Lead, NewLead, Record, Repository, Session};
use lg_data::SqliteLeadStore;
use tracing::info;

const FIRST_NAMES: [&str; 10] = [
    "Ada", "Grace", "Alan", "Edsger", "Barbara", "Donald", "Frances", "Ken", "Margaret", "Niklaus",
];

const LAST_NAMES: [&str; 10] = [
    "Lovelace", "Hopper", "Turing", "Dijkstra", "Liskov", "Knuth", "Allen", "Thompson", "Hamilton",
    "Wirth",
];

const COMPANIES: [&str; 6] = [
    "Acme Corp",
    "Globex",
    "Initech",
    "Umbrella",
    "Stark Industries",
    "Wayne Enterprises",
];

const TIMEZONES: [&str; 4] = ["America/New_York", "America/Chicago", "Europe/London", "Asia/Tokyo"];

/// Insert `count` generated leads unless the organization already has some.
/// Returns how many were inserted.
pub async fn seed_leads(store: &SqliteLeadStore, session: &Session, count: usize) -> Result<usize> {
    let scope = session.scope();
    if store.count(&scope).await? > 0 {
        return Ok(0);
    }

    println!("Generating {} sample leads...", count);
    let mut rng = 42u32;
    for i in 0..count {
        let first = FIRST_NAMES[random_int(&mut rng) as usize % FIRST_NAMES.len()];
        let last = LAST_NAMES[random_int(&mut rng) as usize % LAST_NAMES.len()];
        let mut draft = NewLead::new(first, format!("{}-{:02}", last, i))
            .with_phone(format!("+1 555 {:03} {:04}", random_int(&mut rng) % 1000, i))
            .with_email(format!("{}.{}{}@example.com", first.to_lowercase(), last.to_lowercase(), i))
            .with_source("sample");

        if random_float(&mut rng) < 0.8 {
            draft.company_name = Some(COMPANIES[random_int(&mut rng) as usize % COMPANIES.len()].to_string());
        }
        draft.timezone = Some(TIMEZONES[i % TIMEZONES.len()].to_string());
        draft.call_status = if random_float(&mut rng) < 0.6 {
            CallStatus::Pending
        } else {
            CallStatus::ALL[random_int(&mut rng) as usize % CallStatus::ALL.len()]
        };
        Lead::stamp_owner(&mut draft, session.user_id);

        store.insert(&scope, draft).await?;
    }

    info!(count, organization = %scope.organization_id, "sample leads created");
    Ok(count)
}

fn random_float(seed: &mut u32) -> f64 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    (*seed as f64) / (u32::MAX as f64)
}

fn random_int(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
    *seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use lg_core::Query;
    use uuid::Uuid;

    fn session() -> Session {
        Session {
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            email: "demo@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_seeds_once() {
        let store = SqliteLeadStore::open_in_memory().unwrap();
        let session = session();
        assert_eq!(seed_leads(&store, &session, 12).await.unwrap(), 12);
        assert_eq!(seed_leads(&store, &session, 12).await.unwrap(), 0);

        let page = store.fetch_page(&Query::new(session.scope())).await.unwrap();
        assert_eq!(page.total, 12);
        assert!(page.rows.iter().all(|lead| lead.user_id == session.user_id));
    }
}
