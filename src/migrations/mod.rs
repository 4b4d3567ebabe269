use crate::errors::RepoError;
use crate::types::*;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stores (
    id           UUID PRIMARY KEY,
    owner_id     UUID NOT NULL,
    name         VARCHAR(255) NOT NULL,
    delivery_fee NUMERIC(10, 2) NOT NULL DEFAULT 0 CHECK (delivery_fee >= 0)
);

CREATE TABLE IF NOT EXISTS products (
    id                  UUID PRIMARY KEY,
    store_id            UUID NOT NULL REFERENCES stores (id) ON DELETE CASCADE,
    name                VARCHAR(255) NOT NULL,
    price               NUMERIC(10, 2) NOT NULL CHECK (price >= 0),
    discount_percentage NUMERIC(5, 2) NOT NULL DEFAULT 0,
    stock_quantity      INTEGER NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
    low_stock_threshold INTEGER NOT NULL DEFAULT 10,
    is_available        BOOLEAN NOT NULL DEFAULT TRUE,
    total_sold          INTEGER NOT NULL DEFAULT 0,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS addresses (
    id                    UUID PRIMARY KEY,
    user_id               UUID NOT NULL,
    address_type          VARCHAR(20) NOT NULL,
    address_line1         VARCHAR(255) NOT NULL,
    address_line2         VARCHAR(255) NOT NULL DEFAULT '',
    city                  VARCHAR(100) NOT NULL,
    state                 VARCHAR(100) NOT NULL,
    postal_code           VARCHAR(20) NOT NULL,
    country               VARCHAR(100) NOT NULL,
    is_default            BOOLEAN NOT NULL DEFAULT FALSE,
    delivery_instructions TEXT NOT NULL DEFAULT '',
    created_at            TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE UNIQUE INDEX IF NOT EXISTS addresses_single_default ON addresses (user_id) WHERE is_default;

CREATE TABLE IF NOT EXISTS carts (
    id         UUID PRIMARY KEY,
    user_id    UUID NOT NULL,
    store_id   UUID NOT NULL REFERENCES stores (id) ON DELETE CASCADE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT cart_owner UNIQUE (user_id, store_id)
);

CREATE TABLE IF NOT EXISTS cart_lines (
    id                   UUID PRIMARY KEY,
    cart_id              UUID NOT NULL REFERENCES carts (id) ON DELETE CASCADE,
    product_id           UUID NOT NULL REFERENCES products (id) ON DELETE CASCADE,
    quantity             INTEGER NOT NULL CHECK (quantity >= 1),
    special_instructions TEXT NOT NULL DEFAULT '',
    created_at           TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at           TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT cart_line_product UNIQUE (cart_id, product_id)
);

CREATE TABLE IF NOT EXISTS orders (
    id                    UUID PRIMARY KEY,
    order_number          VARCHAR(20) NOT NULL UNIQUE,
    customer_id           UUID NOT NULL,
    store_id              UUID NOT NULL REFERENCES stores (id),
    delivery_address_id   UUID REFERENCES addresses (id) ON DELETE SET NULL,
    status                VARCHAR(20) NOT NULL,
    payment_method        VARCHAR(20) NOT NULL,
    payment_status        VARCHAR(20) NOT NULL,
    subtotal              NUMERIC(10, 2) NOT NULL,
    delivery_fee          NUMERIC(10, 2) NOT NULL,
    tax_amount            NUMERIC(10, 2) NOT NULL,
    discount_amount       NUMERIC(10, 2) NOT NULL DEFAULT 0,
    total_amount          NUMERIC(10, 2) NOT NULL,
    delivery_instructions TEXT NOT NULL DEFAULT '',
    created_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
    confirmed_at          TIMESTAMPTZ,
    delivered_at          TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS orders_customer ON orders (customer_id, created_at DESC);
CREATE INDEX IF NOT EXISTS orders_store ON orders (store_id, created_at DESC);

CREATE TABLE IF NOT EXISTS order_lines (
    id                   UUID PRIMARY KEY,
    order_id             UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    product_id           UUID REFERENCES products (id) ON DELETE SET NULL,
    product_name         VARCHAR(255) NOT NULL,
    product_price        NUMERIC(10, 2) NOT NULL,
    quantity             INTEGER NOT NULL CHECK (quantity >= 1),
    subtotal             NUMERIC(10, 2) NOT NULL,
    special_instructions TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS order_diffs (
    id         UUID PRIMARY KEY,
    seq        BIGSERIAL,
    order_id   UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    status     VARCHAR(20) NOT NULL,
    committer  UUID,
    notes      TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS coupons (
    id                  UUID PRIMARY KEY,
    code                VARCHAR(50) NOT NULL UNIQUE,
    description         TEXT NOT NULL DEFAULT '',
    discount_type       VARCHAR(20) NOT NULL,
    discount_value      NUMERIC(10, 2) NOT NULL,
    min_order_amount    NUMERIC(10, 2) NOT NULL DEFAULT 0,
    max_discount_amount NUMERIC(10, 2),
    valid_from          TIMESTAMPTZ NOT NULL,
    valid_until         TIMESTAMPTZ NOT NULL,
    usage_limit         INTEGER,
    usage_per_user      INTEGER NOT NULL DEFAULT 1,
    times_used          INTEGER NOT NULL DEFAULT 0,
    store_id            UUID REFERENCES stores (id) ON DELETE CASCADE,
    is_active           BOOLEAN NOT NULL DEFAULT TRUE,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS coupon_redemptions (
    id              UUID PRIMARY KEY,
    coupon_id       UUID NOT NULL REFERENCES coupons (id) ON DELETE CASCADE,
    order_id        UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    user_id         UUID NOT NULL,
    discount_amount NUMERIC(10, 2) NOT NULL,
    used_at         TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT redemption_order UNIQUE (coupon_id, order_id)
);

CREATE TABLE IF NOT EXISTS payments (
    id                UUID PRIMARY KEY,
    order_id          UUID NOT NULL UNIQUE REFERENCES orders (id) ON DELETE CASCADE,
    user_id           UUID NOT NULL,
    transaction_id    VARCHAR(20) NOT NULL UNIQUE,
    payment_method    VARCHAR(20) NOT NULL,
    amount            NUMERIC(10, 2) NOT NULL,
    currency          VARCHAR(3) NOT NULL,
    status            VARCHAR(20) NOT NULL,
    gateway_intent_id VARCHAR(255),
    gateway_charge_id VARCHAR(255),
    gateway_response  JSONB NOT NULL DEFAULT 'null',
    failure_reason    TEXT NOT NULL DEFAULT '',
    failure_code      VARCHAR(50) NOT NULL DEFAULT '',
    refunded_amount   NUMERIC(10, 2) NOT NULL DEFAULT 0,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
    completed_at      TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS payments_intent ON payments (gateway_intent_id);

CREATE TABLE IF NOT EXISTS refunds (
    id                UUID PRIMARY KEY,
    payment_id        UUID NOT NULL REFERENCES payments (id) ON DELETE CASCADE,
    order_id          UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
    amount            NUMERIC(10, 2) NOT NULL CHECK (amount > 0),
    reason            VARCHAR(50) NOT NULL,
    description       TEXT NOT NULL DEFAULT '',
    status            VARCHAR(20) NOT NULL,
    gateway_refund_id VARCHAR(255),
    failure_reason    TEXT NOT NULL DEFAULT '',
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
    processed_at      TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS notifications (
    id         UUID PRIMARY KEY,
    user_id    UUID NOT NULL,
    kind       VARCHAR(50) NOT NULL,
    title      VARCHAR(200) NOT NULL,
    message    TEXT NOT NULL,
    payload    JSONB NOT NULL DEFAULT '{}',
    is_read    BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS notifications_user ON notifications (user_id, is_read);
";

/// Creates missing tables and indexes.
pub async fn run(db_pool: &DbPool) -> Result<(), RepoError> {
    let conn = db_pool.get().await?;
    conn.batch_execute(SCHEMA).await?;
    debug!("Database schema is up to date");

    Ok(())
}
