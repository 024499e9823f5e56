//! Message log and ledger tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(LEDGER_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r"
            DROP TABLE IF EXISTS token_transfers CASCADE;
            DROP TABLE IF EXISTS token_accounts CASCADE;
            DROP TABLE IF EXISTS native_transfers CASCADE;
            DROP TABLE IF EXISTS native_balances CASCADE;
            DROP TABLE IF EXISTS ledger_messages CASCADE;
            ",
        )
        .await?;
        Ok(())
    }
}

const LEDGER_SQL: &str = r"
-- Append-only message log; sequence is the fold order
CREATE TABLE ledger_messages (
    sequence BIGSERIAL PRIMARY KEY,
    tx_id VARCHAR(64) NOT NULL UNIQUE,
    message_type VARCHAR(64) NOT NULL,
    payload JSONB NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_ledger_messages_type ON ledger_messages(message_type);

-- Messages are never rewritten
CREATE OR REPLACE FUNCTION ledger_messages_immutable() RETURNS trigger AS $$
BEGIN
    RAISE EXCEPTION 'ledger_messages is append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_messages_immutable
    BEFORE UPDATE OR DELETE ON ledger_messages
    FOR EACH ROW EXECUTE FUNCTION ledger_messages_immutable();

-- Native currency
CREATE TABLE native_balances (
    account_id VARCHAR(128) PRIMARY KEY,
    balance BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_native_balance_non_negative CHECK (balance >= 0)
);

CREATE TABLE native_transfers (
    id UUID PRIMARY KEY,
    from_account VARCHAR(128) NOT NULL REFERENCES native_balances(account_id),
    to_account VARCHAR(128) NOT NULL REFERENCES native_balances(account_id),
    amount BIGINT NOT NULL,
    memo TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_native_transfer_positive CHECK (amount > 0),
    CONSTRAINT chk_native_transfer_distinct CHECK (from_account <> to_account)
);

CREATE INDEX idx_native_transfers_from ON native_transfers(from_account, created_at);
CREATE INDEX idx_native_transfers_to ON native_transfers(to_account, created_at);

-- Reward token
CREATE TABLE token_accounts (
    account_id VARCHAR(128) PRIMARY KEY,
    balance BIGINT NOT NULL DEFAULT 0,
    associated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_token_balance_non_negative CHECK (balance >= 0)
);

CREATE TABLE token_transfers (
    id UUID PRIMARY KEY,
    from_account VARCHAR(128) REFERENCES token_accounts(account_id),
    to_account VARCHAR(128) NOT NULL REFERENCES token_accounts(account_id),
    amount BIGINT NOT NULL,
    memo TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_token_transfer_positive CHECK (amount > 0)
);

CREATE INDEX idx_token_transfers_to ON token_transfers(to_account, created_at);
";
