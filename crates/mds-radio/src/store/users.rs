// SPDX-FileCopyrightText: 2026 MDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User mirror.

use mds_core::{MdsError, User};
use rusqlite::{Connection, params};

use super::expect_affected;

pub fn create_user(conn: &Connection, user: &User) -> Result<(), MdsError> {
    conn.execute(
        "INSERT INTO users (id, username, first_name, last_name, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.id, user.username, user.first_name, user.last_name, user.is_active],
    )?;
    Ok(())
}

pub fn update_user(conn: &Connection, user: &User) -> Result<(), MdsError> {
    let affected = conn.execute(
        "UPDATE users SET username = ?2, first_name = ?3, last_name = ?4, is_active = ?5 WHERE id = ?1",
        params![user.id, user.username, user.first_name, user.last_name, user.is_active],
    )?;
    expect_affected(affected, "user", user.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::open_db;
    use uuid::Uuid;

    #[tokio::test]
    async fn update_of_unknown_user_is_not_found() {
        let (db, _dir) = open_db().await;
        let user = User {
            id: Uuid::new_v4(),
            username: "kim".into(),
            first_name: "Kim".into(),
            last_name: "Ode".into(),
            is_active: true,
        };
        let err = db
            .transaction({
                let user = user.clone();
                move |tx| update_user(tx, &user)
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        db.transaction(move |tx| {
            create_user(tx, &user)?;
            update_user(tx, &User { is_active: false, ..user })
        })
        .await
        .unwrap();
    }
}
