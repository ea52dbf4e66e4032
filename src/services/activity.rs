// src/services/activity.rs

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::{
    config::{LAST_SESSION_MINUTES, SESSION_CAP_MINUTES},
    models::activity::DailyLogin,
    utils::client::ClientInfo,
};

/// Appends a successful login and returns its running login number.
pub async fn record_login(
    pool: &PgPool,
    user_id: i64,
    username: &str,
    client: &ClientInfo,
) -> Result<i64, sqlx::Error> {
    let (login_num,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO login_activities (user_id, username, login_ip, status, user_agent, login_num)
        VALUES (
            $1, $2, $3, 'S', $4,
            (SELECT COUNT(*) + 1 FROM login_activities WHERE user_id = $1)
        )
        RETURNING login_num
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(&client.ip)
    .bind(&client.user_agent)
    .fetch_one(pool)
    .await?;

    Ok(login_num)
}

pub async fn login_times(pool: &PgPool, user_id: i64) -> Result<Vec<DateTime<Utc>>, sqlx::Error> {
    let rows: Vec<(DateTime<Utc>,)> = sqlx::query_as(
        "SELECT login_datetime FROM login_activities WHERE user_id = $1 AND status = 'S' ORDER BY login_datetime",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(t,)| t).collect())
}

/// Groups logins by UTC date and estimates time spent.
///
/// * The gap to the next login is credited to the earlier login's date, capped
///   at `SESSION_CAP_MINUTES`.
/// * The final login is credited `LAST_SESSION_MINUTES`.
pub fn summarize_logins(logins: &[DateTime<Utc>]) -> Vec<DailyLogin> {
    let mut sorted = logins.to_vec();
    sorted.sort();

    let mut days: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for pair in sorted.windows(2) {
        let gap = (pair[1] - pair[0]).num_minutes().clamp(0, SESSION_CAP_MINUTES);
        days.entry(pair[0].date_naive()).or_default().1 += gap;
    }
    for login in &sorted {
        days.entry(login.date_naive()).or_default().0 += 1;
    }
    if let Some(last) = sorted.last() {
        days.entry(last.date_naive()).or_default().1 += LAST_SESSION_MINUTES;
    }

    days.into_iter()
        .map(|(date, (login_count, time_spent_minutes))| DailyLogin {
            date,
            login_count,
            time_spent_minutes,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, h, m, 0).unwrap()
    }

    #[test]
    fn no_logins_no_summary() {
        assert!(summarize_logins(&[]).is_empty());
    }

    #[test]
    fn single_login_counts_last_session() {
        let summary = summarize_logins(&[at(1, 9, 0)]);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].login_count, 1);
        assert_eq!(summary[0].time_spent_minutes, LAST_SESSION_MINUTES);
    }

    #[test]
    fn gaps_are_capped_and_credited_to_earlier_day() {
        let summary = summarize_logins(&[
            at(2, 9, 0),
            at(1, 9, 0),
            at(1, 9, 12),
            at(1, 23, 50),
        ]);
        assert_eq!(
            summary,
            vec![
                DailyLogin {
                    date: at(1, 0, 0).date_naive(),
                    login_count: 3,
                    // 12 + 30 (capped) + 30 (capped, crosses midnight)
                    time_spent_minutes: 72,
                },
                DailyLogin {
                    date: at(2, 0, 0).date_naive(),
                    login_count: 1,
                    time_spent_minutes: LAST_SESSION_MINUTES,
                },
            ]
        );
    }
}
