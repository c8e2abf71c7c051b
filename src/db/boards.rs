use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection};
use uuid::Uuid;

use super::on_unique;
use crate::error::{AppError, Result};
use crate::lifecycle::{self, RepairStep, Rules, SubstituteSlot, Transition};
use crate::models::{
    Board, BoardPatch, BoardRow, CreateBoardRequest, InwardEntryRequest, SendForServiceRequest,
};

const BOARD_ID_CONSTRAINT: &str = "boards_board_id_key";

pub(super) async fn fetch_all(conn: &mut PgConnection) -> Result<Vec<Board>> {
    let rows = sqlx::query_as::<_, BoardRow>("SELECT * FROM boards ORDER BY board_id")
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter()
        .map(|row| Board::try_from(row).map_err(AppError::from))
        .collect()
}

/// Fetch and row-lock a board for the rest of the transaction
async fn lock_board(conn: &mut PgConnection, id: Uuid) -> Result<Board> {
    let row = sqlx::query_as::<_, BoardRow>("SELECT * FROM boards WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Board not found".to_string()))?;

    Ok(Board::try_from(row)?)
}

async fn lock_board_by_code(conn: &mut PgConnection, board_id: &str) -> Result<Option<Board>> {
    let row = sqlx::query_as::<_, BoardRow>("SELECT * FROM boards WHERE board_id = $1 FOR UPDATE")
        .bind(board_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(Board::try_from).transpose()?)
}

/// Board id of another board already listing `substitute` as its spare
async fn covered_by(conn: &mut PgConnection, substitute: &str, except: Uuid) -> Result<Option<String>> {
    let covering = sqlx::query_scalar::<_, String>(
        "SELECT board_id FROM boards WHERE substitute_board = $1 AND id <> $2 LIMIT 1",
    )
    .bind(substitute)
    .bind(except)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(covering)
}

/// Conflict when another board references `board` as its substitute
async fn ensure_not_covering(conn: &mut PgConnection, board: &Board, action: &str) -> Result<()> {
    match covered_by(conn, &board.board_id, board.id).await? {
        Some(covering) => Err(AppError::Conflict(format!(
            "Board '{}' is the substitute for '{}' and cannot be {}",
            board.board_id, covering, action
        ))),
        None => Ok(()),
    }
}

async fn mill_exists(conn: &mut PgConnection, name: &str) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM mills WHERE name = $1)")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

async fn partner_exists(conn: &mut PgConnection, name: &str) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM service_partners WHERE name = $1)",
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

/// Write every mutable column of a board
async fn store_board(conn: &mut PgConnection, board: &Board) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE boards
        SET board_id = $2,
            current_status = $3,
            current_location = $4,
            mill_assigned = $5,
            warranty_status = $6,
            warranty_expiry = $7,
            purchase_date = $8,
            substitute_board = $9,
            open_service = $10,
            service_history = $11,
            updated_at = $12
        WHERE id = $1
        "#,
    )
    .bind(board.id)
    .bind(&board.board_id)
    .bind(board.current_status.as_str())
    .bind(&board.current_location)
    .bind(&board.mill_assigned)
    .bind(board.warranty_status.as_str())
    .bind(board.warranty_expiry)
    .bind(board.purchase_date)
    .bind(&board.substitute_board)
    .bind(board.open_service.as_ref().map(Json))
    .bind(Json(&board.service_history))
    .bind(board.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        on_unique(e, BOARD_ID_CONSTRAINT, || {
            format!("Board '{}' already exists", board.board_id)
        })
    })?;

    Ok(())
}

impl super::Database {
    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        let mut conn = self.pool.acquire().await?;
        fetch_all(&mut conn).await
    }

    pub async fn get_board(&self, id: Uuid) -> Result<Board> {
        let row = sqlx::query_as::<_, BoardRow>("SELECT * FROM boards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Board not found".to_string()))?;

        Ok(Board::try_from(row)?)
    }

    /// Register a board; its mill must exist
    pub async fn create_board(&self, req: &CreateBoardRequest) -> Result<Board> {
        let mut conn = self.pool.acquire().await?;
        if !mill_exists(&mut conn, &req.mill_assigned).await? {
            return Err(AppError::NotFound(format!(
                "Mill '{}' not found",
                req.mill_assigned
            )));
        }

        let location = req
            .current_location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(&req.mill_assigned);
        let substitute = req
            .substitute_board
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let row = sqlx::query_as::<_, BoardRow>(
            r#"
            INSERT INTO boards (id, board_id, current_status, current_location, mill_assigned,
                                warranty_status, warranty_expiry, purchase_date, substitute_board,
                                service_history, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, '[]', NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.board_id.trim())
        .bind(req.current_status.as_str())
        .bind(location)
        .bind(&req.mill_assigned)
        .bind(req.warranty_status.as_str())
        .bind(req.warranty_expiry)
        .bind(req.purchase_date)
        .bind(substitute)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            on_unique(e, BOARD_ID_CONSTRAINT, || {
                format!("Board '{}' already exists", req.board_id.trim())
            })
        })?;

        Ok(Board::try_from(row)?)
    }

    /// Direct edit under a row lock. `authorize` sees the current record first.
    pub async fn edit_board<A>(&self, id: Uuid, patch: &BoardPatch, authorize: A) -> Result<Board>
    where
        A: FnOnce(&Board) -> Result<()>,
    {
        let mut tx = self.pool.begin().await?;
        let board = lock_board(&mut tx, id).await?;
        authorize(&board)?;

        if patch.board_id.as_deref().is_some_and(|new_id| new_id != board.board_id) {
            ensure_not_covering(&mut tx, &board, "renamed").await?;
        }

        if let Some(mill) = patch.mill_assigned.as_deref() {
            if mill != board.mill_assigned && !mill_exists(&mut tx, mill).await? {
                return Err(AppError::NotFound(format!("Mill '{}' not found", mill)));
            }
        }

        let next = lifecycle::direct_edit(&board, patch, Utc::now());
        store_board(&mut tx, &next).await?;
        tx.commit().await?;

        tracing::info!(
            board = %next.board_id,
            status = %next.current_status,
            "Board edited directly"
        );
        Ok(next)
    }

    /// Refused while another board still lists this one as its substitute
    pub async fn delete_board(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let board = lock_board(&mut tx, id).await?;
        ensure_not_covering(&mut tx, &board, "deleted").await?;

        sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    /// Dispatch a board, moving its substitute in the same transaction
    pub async fn send_for_service<A>(
        &self,
        id: Uuid,
        req: &SendForServiceRequest,
        rules: Rules,
        authorize: A,
    ) -> Result<Transition>
    where
        A: FnOnce(&Board) -> Result<()>,
    {
        let mut tx = self.pool.begin().await?;
        let board = lock_board(&mut tx, id).await?;
        authorize(&board)?;

        if !partner_exists(&mut tx, &req.service_partner).await? {
            return Err(AppError::NotFound(format!(
                "Service partner '{}' not found",
                req.service_partner
            )));
        }

        let spare = match req.substitute() {
            Some(code) => Some(
                lock_board_by_code(&mut tx, code)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Substitute board '{}' not found", code)))?,
            ),
            None => None,
        };
        let covering = match &spare {
            Some(s) => covered_by(&mut tx, &s.board_id, board.id).await?,
            None => None,
        };
        let slot = spare.as_ref().map(|s| SubstituteSlot {
            board: s,
            covering: covering.as_deref(),
        });

        // Spare deployed on an earlier visit and never returned
        let previous = match board.substitute_board.as_deref() {
            Some(code) if board.has_substitute() && req.substitute() != Some(code) => {
                let found = lock_board_by_code(&mut tx, code).await?;
                if found.is_none() {
                    tracing::warn!(
                        board = %board.board_id,
                        substitute = %code,
                        "Previous substitute board missing, clearing reference only"
                    );
                }
                found
            }
            _ => None,
        };

        let transition =
            lifecycle::send_for_service(&board, req, slot, previous.as_ref(), rules, Utc::now())?;
        for record in transition.records() {
            store_board(&mut tx, record).await?;
        }
        tx.commit().await?;

        tracing::info!(
            board = %transition.board.board_id,
            partner = %req.service_partner,
            substitute = ?transition.board.substitute_board,
            released = ?transition.released.as_ref().map(|b| &b.board_id),
            "Board sent for service"
        );
        Ok(transition)
    }

    pub async fn advance_repair<A>(&self, id: Uuid, step: RepairStep, authorize: A) -> Result<Board>
    where
        A: FnOnce(&Board) -> Result<()>,
    {
        let mut tx = self.pool.begin().await?;
        let board = lock_board(&mut tx, id).await?;
        authorize(&board)?;

        let next = lifecycle::advance_repair(&board, step, Utc::now())?;
        store_board(&mut tx, &next).await?;
        tx.commit().await?;

        tracing::info!(board = %next.board_id, status = %next.current_status, "Repair progress recorded");
        Ok(next)
    }

    /// Close a service visit, returning the substitute to its mill when asked
    pub async fn process_inward<A>(
        &self,
        id: Uuid,
        req: &InwardEntryRequest,
        authorize: A,
    ) -> Result<Transition>
    where
        A: FnOnce(&Board) -> Result<()>,
    {
        let mut tx = self.pool.begin().await?;
        let board = lock_board(&mut tx, id).await?;
        authorize(&board)?;

        let spare = match board.substitute_board.as_deref() {
            Some(code) if req.return_substitute && board.has_substitute() => {
                let found = lock_board_by_code(&mut tx, code).await?;
                if found.is_none() {
                    tracing::warn!(
                        board = %board.board_id,
                        substitute = %code,
                        "Substitute board missing, clearing reference only"
                    );
                }
                found
            }
            _ => None,
        };

        let transition = lifecycle::process_inward(&board, req, spare.as_ref(), Utc::now())?;
        for record in transition.records() {
            store_board(&mut tx, record).await?;
        }
        tx.commit().await?;

        tracing::info!(
            board = %transition.board.board_id,
            result = req.service_result.as_str(),
            status = %transition.board.current_status,
            "Inward entry processed"
        );
        Ok(transition)
    }

    /// Flip lapsed warranties to "Out of Warranty"; `updated_at` is left alone
    pub async fn expire_warranties(&self, now: DateTime<Utc>) -> Result<Vec<Board>> {
        let rows = sqlx::query_as::<_, BoardRow>(
            r#"
            UPDATE boards
            SET warranty_status = 'Out of Warranty'
            WHERE warranty_expiry < $1
              AND warranty_status <> 'Out of Warranty'
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Board::try_from(row).map_err(AppError::from))
            .collect()
    }
}
