//! SQLite schema definition.

/// Complete database schema for petcare.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Hospitals
-- ============================================================================

CREATE TABLE IF NOT EXISTS hospitals (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    owner_id TEXT,
    pet_id TEXT NOT NULL,
    hospital_id TEXT NOT NULL,
    veterinarian_id TEXT NOT NULL,
    appointment_date TEXT NOT NULL,               -- YYYY-MM-DD, practice-local
    time_slot TEXT NOT NULL,                      -- HH:MM, 24-hour
    status TEXT NOT NULL DEFAULT 'pending',
    token_counter INTEGER NOT NULL,
    token_number TEXT NOT NULL,
    body TEXT NOT NULL,                           -- JSON AppointmentRecord
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- At most one live appointment per (veterinarian, date, time slot)
CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_slot
    ON appointments(veterinarian_id, appointment_date, time_slot)
    WHERE status <> 'cancelled';

-- A token is never handed out twice for the same hospital and day
CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_token
    ON appointments(hospital_id, appointment_date, token_counter);

CREATE INDEX IF NOT EXISTS idx_appointments_pet ON appointments(pet_id);

-- ============================================================================
-- Token Counters
-- ============================================================================

CREATE TABLE IF NOT EXISTS token_counters (
    hospital_id TEXT NOT NULL,
    counter_date TEXT NOT NULL,
    last_value INTEGER NOT NULL,
    PRIMARY KEY (hospital_id, counter_date)
);

-- ============================================================================
-- Records (pets, immunizations, diabetes logs, medical documents)
-- ============================================================================

CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    owner_id TEXT,
    pet_id TEXT,
    body TEXT NOT NULL,                           -- JSON domain record
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_records_owner ON records(kind, owner_id);
CREATE INDEX IF NOT EXISTS idx_records_pet ON records(kind, pet_id);
"#;
