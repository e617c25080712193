//! Initial database migration.
//!
//! Creates the trust ledger, reconciliation and billing tables, the triggers
//! that keep trust history append-only, and tenant RLS policies. Money is
//! stored as `BIGINT` minor units next to a `CHAR(3)` currency code.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: TENANTS
        // ============================================================
        db.execute_unprepared(ORGANIZATIONS_SQL).await?;

        // ============================================================
        // PART 2: TRUST LEDGER
        // ============================================================
        db.execute_unprepared(TRUST_ACCOUNTS_SQL).await?;
        db.execute_unprepared(CLIENT_LEDGERS_SQL).await?;
        db.execute_unprepared(BANK_STATEMENTS_SQL).await?;
        db.execute_unprepared(TRUST_TRANSACTIONS_SQL).await?;

        // ============================================================
        // PART 3: RECONCILIATION
        // ============================================================
        db.execute_unprepared(RECONCILIATIONS_SQL).await?;

        // ============================================================
        // PART 4: BILLING
        // ============================================================
        db.execute_unprepared(INVOICE_SEQUENCES_SQL).await?;
        db.execute_unprepared(INVOICES_SQL).await?;
        db.execute_unprepared(INVOICE_LINE_ITEMS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        // ============================================================
        // PART 6: ROW-LEVEL SECURITY
        // ============================================================
        db.execute_unprepared(RLS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ORGANIZATIONS_SQL: &str = r"
CREATE TABLE organizations (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const TRUST_ACCOUNTS_SQL: &str = r"
CREATE TABLE trust_accounts (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    name VARCHAR(255) NOT NULL,
    bank_name VARCHAR(255) NOT NULL,
    account_number_last4 VARCHAR(4),
    account_type VARCHAR(32) NOT NULL,
    currency CHAR(3) NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'active',
    book_balance BIGINT NOT NULL DEFAULT 0,
    last_reconciled_date DATE,
    last_reconciled_balance BIGINT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_trust_account_type CHECK (account_type IN ('iolta', 'client_trust', 'escrow')),
    CONSTRAINT chk_trust_account_status CHECK (status IN ('active', 'closed')),
    CONSTRAINT chk_trust_account_balance CHECK (book_balance >= 0)
);

CREATE INDEX idx_trust_accounts_org ON trust_accounts(organization_id);
";

const CLIENT_LEDGERS_SQL: &str = r"
CREATE TABLE client_ledgers (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    trust_account_id UUID NOT NULL REFERENCES trust_accounts(id),
    client_id UUID NOT NULL,
    matter_id UUID,
    name VARCHAR(255) NOT NULL,
    balance BIGINT NOT NULL DEFAULT 0,
    status VARCHAR(16) NOT NULL DEFAULT 'active',
    version BIGINT NOT NULL DEFAULT 0,
    last_activity_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_client_ledger_status CHECK (status IN ('active', 'closed')),
    CONSTRAINT chk_client_ledger_balance CHECK (balance >= 0)
);

CREATE INDEX idx_client_ledgers_account ON client_ledgers(trust_account_id);
CREATE INDEX idx_client_ledgers_client ON client_ledgers(organization_id, client_id);
";

const BANK_STATEMENTS_SQL: &str = r"
CREATE TABLE bank_statement_imports (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    trust_account_id UUID NOT NULL REFERENCES trust_accounts(id),
    period_start DATE NOT NULL,
    period_end DATE NOT NULL,
    currency CHAR(3) NOT NULL,
    opening_balance BIGINT NOT NULL,
    closing_balance BIGINT NOT NULL,
    format VARCHAR(16) NOT NULL,
    imported_by UUID NOT NULL,
    imported_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_statement_period CHECK (period_start <= period_end)
);

CREATE INDEX idx_statement_imports_account ON bank_statement_imports(trust_account_id, period_end);

CREATE TABLE bank_statement_lines (
    id UUID PRIMARY KEY,
    statement_import_id UUID NOT NULL REFERENCES bank_statement_imports(id),
    position INTEGER NOT NULL,
    line_date DATE NOT NULL,
    amount BIGINT NOT NULL,
    description TEXT NOT NULL,
    reference VARCHAR(100),

    CONSTRAINT uq_statement_line_position UNIQUE (statement_import_id, position)
);
";

const TRUST_TRANSACTIONS_SQL: &str = r"
CREATE TABLE trust_transactions (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    trust_account_id UUID NOT NULL REFERENCES trust_accounts(id),
    client_ledger_id UUID NOT NULL REFERENCES client_ledgers(id),
    transaction_type VARCHAR(16) NOT NULL,
    amount BIGINT NOT NULL,
    balance_after BIGINT NOT NULL,
    description TEXT NOT NULL,
    transaction_date DATE NOT NULL,
    reference VARCHAR(100),
    reversal_of UUID REFERENCES trust_transactions(id),
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    cleared_statement_id UUID REFERENCES bank_statement_imports(id),
    cleared_period_end DATE,
    cleared_by UUID,
    cleared_at TIMESTAMPTZ,

    CONSTRAINT chk_trust_transaction_type CHECK (
        transaction_type IN ('deposit', 'withdrawal', 'transfer', 'interest', 'fee')
    ),
    CONSTRAINT chk_trust_transaction_amount CHECK (amount > 0),
    CONSTRAINT chk_trust_transaction_balance CHECK (balance_after >= 0),
    CONSTRAINT chk_trust_transaction_clearance CHECK (
        (cleared_statement_id IS NULL) = (cleared_at IS NULL)
    )
);

CREATE INDEX idx_trust_transactions_ledger ON trust_transactions(client_ledger_id, created_at);
CREATE INDEX idx_trust_transactions_account ON trust_transactions(trust_account_id, transaction_date);
CREATE UNIQUE INDEX uq_trust_transactions_reversal
    ON trust_transactions(reversal_of) WHERE reversal_of IS NOT NULL;
";

const RECONCILIATIONS_SQL: &str = r"
CREATE TABLE reconciliations (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    trust_account_id UUID NOT NULL REFERENCES trust_accounts(id),
    statement_import_id UUID REFERENCES bank_statement_imports(id),
    period_start DATE NOT NULL,
    period_end DATE NOT NULL,
    status VARCHAR(16) NOT NULL,
    is_balanced BOOLEAN NOT NULL,
    report JSONB NOT NULL,
    prepared_by UUID NOT NULL,
    prepared_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    submitted_by UUID,
    approved_by UUID,
    approved_at TIMESTAMPTZ,
    override_justification TEXT,

    CONSTRAINT chk_reconciliation_status CHECK (status IN ('draft', 'pending', 'approved', 'flagged')),
    CONSTRAINT chk_reconciliation_override CHECK (
        status <> 'approved' OR is_balanced OR override_justification IS NOT NULL
    )
);

CREATE INDEX idx_reconciliations_account ON reconciliations(trust_account_id, period_end DESC);
";

const INVOICE_SEQUENCES_SQL: &str = r"
CREATE TABLE invoice_sequences (
    organization_id UUID PRIMARY KEY REFERENCES organizations(id),
    prefix VARCHAR(20) NOT NULL,
    last_sequence BIGINT NOT NULL DEFAULT 0
);
";

const INVOICES_SQL: &str = r"
CREATE TABLE invoices (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    client_id UUID NOT NULL,
    matter_id UUID,
    invoice_number VARCHAR(64) NOT NULL,
    currency CHAR(3) NOT NULL,
    issue_date DATE NOT NULL,
    due_date DATE NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'draft',
    subtotal BIGINT NOT NULL DEFAULT 0,
    tax_amount BIGINT NOT NULL DEFAULT 0,
    total_amount BIGINT NOT NULL DEFAULT 0,
    paid_amount BIGINT NOT NULL DEFAULT 0,
    overpayment_amount BIGINT NOT NULL DEFAULT 0,
    write_off_amount BIGINT NOT NULL DEFAULT 0,
    balance_due BIGINT NOT NULL DEFAULT 0,
    totals_finalized BOOLEAN NOT NULL DEFAULT FALSE,
    notes TEXT,
    terms TEXT,
    write_off_reason TEXT,
    created_by UUID NOT NULL,
    approved_by UUID,
    sent_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_invoices_org_number UNIQUE (organization_id, invoice_number),
    CONSTRAINT chk_invoice_status CHECK (status IN (
        'draft', 'pending_approval', 'approved', 'sent', 'viewed',
        'paid', 'cancelled', 'written_off'
    )),
    CONSTRAINT chk_invoice_due_date CHECK (due_date >= issue_date),
    CONSTRAINT chk_invoice_balance CHECK (balance_due >= 0),
    CONSTRAINT chk_invoice_paid CHECK (paid_amount >= 0)
);

CREATE INDEX idx_invoices_client ON invoices(organization_id, client_id);
CREATE INDEX idx_invoices_status ON invoices(organization_id, status, due_date);
";

const INVOICE_LINE_ITEMS_SQL: &str = r"
CREATE TABLE invoice_line_items (
    id UUID PRIMARY KEY,
    invoice_id UUID NOT NULL REFERENCES invoices(id),
    line_number INTEGER NOT NULL,
    kind VARCHAR(16) NOT NULL,
    description TEXT NOT NULL,
    quantity NUMERIC(12, 4) NOT NULL,
    rate BIGINT NOT NULL,
    amount BIGINT NOT NULL,
    tax_code VARCHAR(32),
    billing_code VARCHAR(16),
    service_date DATE,

    CONSTRAINT uq_invoice_line_number UNIQUE (invoice_id, line_number),
    CONSTRAINT chk_line_item_kind CHECK (kind IN ('time', 'expense', 'fixed_fee')),
    CONSTRAINT chk_line_item_quantity CHECK (quantity > 0),
    CONSTRAINT chk_line_item_rate CHECK (rate >= 0)
);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    invoice_id UUID NOT NULL REFERENCES invoices(id),
    amount BIGINT NOT NULL,
    applied_amount BIGINT NOT NULL,
    excess_amount BIGINT NOT NULL DEFAULT 0,
    method VARCHAR(20) NOT NULL,
    payment_date DATE NOT NULL,
    reference VARCHAR(100),
    recorded_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_payment_amount CHECK (amount > 0),
    CONSTRAINT chk_payment_split CHECK (applied_amount + excess_amount = amount)
);

CREATE INDEX idx_payments_invoice ON payments(invoice_id, created_at);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_trust_history_rewrite
-- Only clearance fields may change on a trust transaction, once
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_trust_history_rewrite()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        RAISE EXCEPTION 'Trust transactions cannot be deleted. Post a reversal instead.';
    END IF;

    IF NEW.amount <> OLD.amount
        OR NEW.transaction_type <> OLD.transaction_type
        OR NEW.client_ledger_id <> OLD.client_ledger_id
        OR NEW.trust_account_id <> OLD.trust_account_id
        OR NEW.balance_after <> OLD.balance_after
        OR NEW.transaction_date <> OLD.transaction_date
        OR NEW.description <> OLD.description
        OR NEW.reversal_of IS DISTINCT FROM OLD.reversal_of THEN
        RAISE EXCEPTION 'Trust transactions are immutable. Post a reversal instead.';
    END IF;

    IF OLD.cleared_statement_id IS NOT NULL THEN
        RAISE EXCEPTION 'Trust transaction % is already cleared', OLD.id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_trust_history_rewrite
BEFORE UPDATE OR DELETE ON trust_transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_trust_history_rewrite();

-- ============================================================
-- FUNCTION: prevent_statement_modification
-- Imported statements are read-only
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_statement_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Imported bank statements are read-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_statement_mod
BEFORE UPDATE OR DELETE ON bank_statement_imports
FOR EACH ROW
EXECUTE FUNCTION prevent_statement_modification();

CREATE TRIGGER trg_prevent_statement_line_mod
BEFORE UPDATE OR DELETE ON bank_statement_lines
FOR EACH ROW
EXECUTE FUNCTION prevent_statement_modification();

-- ============================================================
-- FUNCTION: prevent_locked_line_item_change
-- Line items only change while the invoice is a draft
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_locked_line_item_change()
RETURNS TRIGGER AS $$
DECLARE
    invoice_status VARCHAR(20);
BEGIN
    SELECT status INTO invoice_status
    FROM invoices
    WHERE id = COALESCE(NEW.invoice_id, OLD.invoice_id);

    IF invoice_status <> 'draft' THEN
        RAISE EXCEPTION 'Invoice is locked in status %', invoice_status;
    END IF;

    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_locked_line_item_change
BEFORE INSERT OR UPDATE OR DELETE ON invoice_line_items
FOR EACH ROW
EXECUTE FUNCTION prevent_locked_line_item_change();
";

const RLS_SQL: &str = r"
-- ============================================================
-- ROW-LEVEL SECURITY POLICIES
-- Application sets context per transaction:
-- SET LOCAL app.current_organization_id = 'org-uuid';
-- ============================================================

ALTER TABLE organizations ENABLE ROW LEVEL SECURITY;
ALTER TABLE trust_accounts ENABLE ROW LEVEL SECURITY;
ALTER TABLE client_ledgers ENABLE ROW LEVEL SECURITY;
ALTER TABLE trust_transactions ENABLE ROW LEVEL SECURITY;
ALTER TABLE bank_statement_imports ENABLE ROW LEVEL SECURITY;
ALTER TABLE bank_statement_lines ENABLE ROW LEVEL SECURITY;
ALTER TABLE reconciliations ENABLE ROW LEVEL SECURITY;
ALTER TABLE invoice_sequences ENABLE ROW LEVEL SECURITY;
ALTER TABLE invoices ENABLE ROW LEVEL SECURITY;
ALTER TABLE invoice_line_items ENABLE ROW LEVEL SECURITY;
ALTER TABLE payments ENABLE ROW LEVEL SECURITY;

CREATE POLICY tenant_isolation ON organizations
    USING (id = current_setting('app.current_organization_id', true)::UUID);

CREATE POLICY tenant_isolation ON trust_accounts
    USING (organization_id = current_setting('app.current_organization_id', true)::UUID);

CREATE POLICY tenant_isolation ON client_ledgers
    USING (organization_id = current_setting('app.current_organization_id', true)::UUID);

CREATE POLICY tenant_isolation ON trust_transactions
    USING (organization_id = current_setting('app.current_organization_id', true)::UUID);

CREATE POLICY tenant_isolation ON bank_statement_imports
    USING (organization_id = current_setting('app.current_organization_id', true)::UUID);

CREATE POLICY tenant_isolation ON reconciliations
    USING (organization_id = current_setting('app.current_organization_id', true)::UUID);

CREATE POLICY tenant_isolation ON invoice_sequences
    USING (organization_id = current_setting('app.current_organization_id', true)::UUID);

CREATE POLICY tenant_isolation ON invoices
    USING (organization_id = current_setting('app.current_organization_id', true)::UUID);

CREATE POLICY tenant_isolation ON payments
    USING (organization_id = current_setting('app.current_organization_id', true)::UUID);

-- Child tables isolate through their parent
CREATE POLICY tenant_isolation ON bank_statement_lines
    USING (statement_import_id IN (
        SELECT id FROM bank_statement_imports
        WHERE organization_id = current_setting('app.current_organization_id', true)::UUID
    ));

CREATE POLICY tenant_isolation ON invoice_line_items
    USING (invoice_id IN (
        SELECT id FROM invoices
        WHERE organization_id = current_setting('app.current_organization_id', true)::UUID
    ));
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS payments CASCADE;
DROP TABLE IF EXISTS invoice_line_items CASCADE;
DROP TABLE IF EXISTS invoices CASCADE;
DROP TABLE IF EXISTS invoice_sequences CASCADE;
DROP TABLE IF EXISTS reconciliations CASCADE;
DROP TABLE IF EXISTS trust_transactions CASCADE;
DROP TABLE IF EXISTS bank_statement_lines CASCADE;
DROP TABLE IF EXISTS bank_statement_imports CASCADE;
DROP TABLE IF EXISTS client_ledgers CASCADE;
DROP TABLE IF EXISTS trust_accounts CASCADE;
DROP TABLE IF EXISTS organizations CASCADE;

DROP FUNCTION IF EXISTS prevent_trust_history_rewrite();
DROP FUNCTION IF EXISTS prevent_statement_modification();
DROP FUNCTION IF EXISTS prevent_locked_line_item_change();
";
