//! SQLite adapter: Implementation of Store.
//!
//! Provides persistence for users, donors, hospitals, inventory, requests,
//! donations and notifications.
//!
//! # Constraints
//!
//! Uniqueness and referential integrity are enforced by the schema
//! (`PRAGMA foreign_keys = ON`) and surface as [`StoreError::Conflict`] and
//! [`StoreError::InvalidReference`].
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex (from a panic
//! in another thread) is reported as [`StoreError::LockPoisoned`] on every
//! later call.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::domain::{
    Address, BloodInventory, BloodRequest, BloodType, Donation, Donor, EmergencyContact, Hospital,
    Notification, NotificationType, RequestPriority, RequestStatus, Sex, User, UserRole, Vitals,
};
use crate::ports::Store;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("A record with this information already exists: {0}")]
    Conflict(String),

    #[error("Invalid reference to related record: {0}")]
    InvalidReference(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Map constraint violations to their domain meaning; everything else
    /// stays a database error.
    fn classify(err: rusqlite::Error, what: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(e, msg) = &err {
            let detail = msg.clone().unwrap_or_else(|| e.to_string());
            match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return Self::Conflict(format!("{what} ({detail})"));
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return Self::InvalidReference(format!("{what} ({detail})"));
                }
                _ => {}
            }
        }
        Self::Database(err)
    }
}

macro_rules! sql_token {
    ($($ty:ty),+ $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    )+};
}

sql_token!(BloodType, UserRole, Sex, RequestPriority, RequestStatus, NotificationType);

const SCHEMA: &str = r"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        phone TEXT,
        role TEXT NOT NULL DEFAULT 'donor',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS donors (
        id BLOB PRIMARY KEY,
        user_id BLOB NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        blood_type TEXT NOT NULL,
        date_of_birth TEXT NOT NULL,
        weight_kg REAL NOT NULL,
        sex TEXT,
        last_donation_date TEXT,
        next_eligible_date TEXT NOT NULL,
        medical_conditions TEXT NOT NULL DEFAULT '[]',
        emergency_contact_name TEXT,
        emergency_contact_phone TEXT,
        street TEXT NOT NULL DEFAULT '',
        city TEXT NOT NULL DEFAULT '',
        state TEXT NOT NULL DEFAULT '',
        zip_code TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS hospitals (
        id BLOB PRIMARY KEY,
        user_id BLOB NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        license_number TEXT NOT NULL UNIQUE,
        street TEXT NOT NULL,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        zip_code TEXT NOT NULL,
        phone TEXT NOT NULL,
        email TEXT,
        website TEXT,
        capacity INTEGER NOT NULL DEFAULT 0,
        is_verified INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS blood_inventory (
        id BLOB PRIMARY KEY,
        hospital_id BLOB NOT NULL REFERENCES hospitals(id) ON DELETE CASCADE,
        blood_type TEXT NOT NULL,
        units_available INTEGER NOT NULL DEFAULT 0,
        units_reserved INTEGER NOT NULL DEFAULT 0,
        expiry_date TEXT,
        last_updated TEXT NOT NULL,
        UNIQUE (hospital_id, blood_type)
    );

    CREATE TABLE IF NOT EXISTS blood_requests (
        id BLOB PRIMARY KEY,
        hospital_id BLOB NOT NULL REFERENCES hospitals(id) ON DELETE CASCADE,
        blood_type TEXT NOT NULL,
        units_needed INTEGER NOT NULL,
        units_fulfilled INTEGER NOT NULL DEFAULT 0,
        priority TEXT NOT NULL DEFAULT 'medium',
        status TEXT NOT NULL DEFAULT 'open',
        reason TEXT,
        needed_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS donations (
        id BLOB PRIMARY KEY,
        donor_id BLOB NOT NULL REFERENCES donors(id) ON DELETE CASCADE,
        hospital_id BLOB NOT NULL REFERENCES hospitals(id) ON DELETE CASCADE,
        blood_request_id BLOB REFERENCES blood_requests(id) ON DELETE SET NULL,
        donation_date TEXT NOT NULL,
        units_donated INTEGER NOT NULL DEFAULT 1,
        blood_type TEXT NOT NULL,
        hemoglobin_level REAL,
        blood_pressure_systolic INTEGER,
        blood_pressure_diastolic INTEGER,
        notes TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS notifications (
        id BLOB PRIMARY KEY,
        user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        type TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        related_id BLOB,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_donors_blood_type ON donors(blood_type);
    CREATE INDEX IF NOT EXISTS idx_donors_next_eligible_date ON donors(next_eligible_date);
    CREATE INDEX IF NOT EXISTS idx_blood_requests_status ON blood_requests(status);
    CREATE INDEX IF NOT EXISTS idx_blood_requests_priority ON blood_requests(priority);
    CREATE INDEX IF NOT EXISTS idx_blood_requests_blood_type ON blood_requests(blood_type);
    CREATE INDEX IF NOT EXISTS idx_donations_donor_id ON donations(donor_id);
    CREATE INDEX IF NOT EXISTS idx_donations_hospital_id ON donations(hospital_id);
    CREATE INDEX IF NOT EXISTS idx_donations_date ON donations(donation_date);
    CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id);
    CREATE INDEX IF NOT EXISTS idx_notifications_is_read ON notifications(is_read);
";

const USER_COLUMNS: &str = "id, email, full_name, phone, role, created_at, updated_at";

const DONOR_COLUMNS: &str = "id, user_id, blood_type, date_of_birth, weight_kg, sex, \
     last_donation_date, next_eligible_date, medical_conditions, emergency_contact_name, \
     emergency_contact_phone, street, city, state, zip_code, is_active, created_at, updated_at";

const HOSPITAL_COLUMNS: &str = "id, user_id, name, license_number, street, city, state, \
     zip_code, phone, email, website, capacity, is_verified, created_at, updated_at";

const INVENTORY_COLUMNS: &str = "id, hospital_id, blood_type, units_available, units_reserved, \
     expiry_date, last_updated";

const REQUEST_COLUMNS: &str = "id, hospital_id, blood_type, units_needed, units_fulfilled, \
     priority, status, reason, needed_by, created_at, updated_at";

const DONATION_COLUMNS: &str = "id, donor_id, hospital_id, blood_request_id, donation_date, \
     units_donated, blood_type, hemoglobin_level, blood_pressure_systolic, \
     blood_pressure_diastolic, notes, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, type, is_read, related_id, created_at";

/// SQLite storage adapter.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Database schema ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

// ----- row mapping -----

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        full_name: row.get("full_name")?,
        phone: row.get("phone")?,
        role: row.get("role")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn donor_from_row(row: &Row<'_>) -> rusqlite::Result<Donor> {
    let conditions_json: String = row.get("medical_conditions")?;
    let medical_conditions = serde_json::from_str(&conditions_json).map_err(|e| {
        let idx = row.as_ref().column_index("medical_conditions").unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })?;

    let contact_name: Option<String> = row.get("emergency_contact_name")?;
    let contact_phone: Option<String> = row.get("emergency_contact_phone")?;
    let emergency_contact = match (contact_name, contact_phone) {
        (Some(name), Some(phone)) => Some(EmergencyContact { name, phone }),
        _ => None,
    };

    Ok(Donor {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        blood_type: row.get("blood_type")?,
        date_of_birth: row.get("date_of_birth")?,
        weight_kg: row.get("weight_kg")?,
        sex: row.get("sex")?,
        last_donation_date: row.get("last_donation_date")?,
        next_eligible_date: row.get("next_eligible_date")?,
        medical_conditions,
        emergency_contact,
        address: address_from_row(row)?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn address_from_row(row: &Row<'_>) -> rusqlite::Result<Address> {
    Ok(Address {
        street: row.get("street")?,
        city: row.get("city")?,
        state: row.get("state")?,
        zip_code: row.get("zip_code")?,
    })
}

fn hospital_from_row(row: &Row<'_>) -> rusqlite::Result<Hospital> {
    Ok(Hospital {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        license_number: row.get("license_number")?,
        address: address_from_row(row)?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        website: row.get("website")?,
        capacity: row.get("capacity")?,
        is_verified: row.get("is_verified")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn inventory_from_row(row: &Row<'_>) -> rusqlite::Result<BloodInventory> {
    Ok(BloodInventory {
        id: row.get("id")?,
        hospital_id: row.get("hospital_id")?,
        blood_type: row.get("blood_type")?,
        units_available: row.get("units_available")?,
        units_reserved: row.get("units_reserved")?,
        expiry_date: row.get("expiry_date")?,
        last_updated: row.get("last_updated")?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<BloodRequest> {
    Ok(BloodRequest {
        id: row.get("id")?,
        hospital_id: row.get("hospital_id")?,
        blood_type: row.get("blood_type")?,
        units_needed: row.get("units_needed")?,
        units_fulfilled: row.get("units_fulfilled")?,
        priority: row.get("priority")?,
        status: row.get("status")?,
        reason: row.get("reason")?,
        needed_by: row.get("needed_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn donation_from_row(row: &Row<'_>) -> rusqlite::Result<Donation> {
    Ok(Donation {
        id: row.get("id")?,
        donor_id: row.get("donor_id")?,
        hospital_id: row.get("hospital_id")?,
        blood_request_id: row.get("blood_request_id")?,
        donation_date: row.get("donation_date")?,
        units_donated: row.get("units_donated")?,
        blood_type: row.get("blood_type")?,
        vitals: Vitals {
            hemoglobin_level: row.get("hemoglobin_level")?,
            blood_pressure_systolic: row.get("blood_pressure_systolic")?,
            blood_pressure_diastolic: row.get("blood_pressure_diastolic")?,
        },
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        message: row.get("message")?,
        kind: row.get("type")?,
        is_read: row.get("is_read")?,
        related_id: row.get("related_id")?,
        created_at: row.get("created_at")?,
    })
}

// ----- single-row helpers shared by upserts and lookups -----

fn select_one<T>(
    conn: &Connection,
    sql: &str,
    key: impl ToSql,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Option<T>, StoreError> {
    Ok(conn.query_row(sql, params![key], map).optional()?)
}

fn donor_by_user(conn: &Connection, user_id: Uuid) -> Result<Option<Donor>, StoreError> {
    select_one(
        conn,
        &format!("SELECT {DONOR_COLUMNS} FROM donors WHERE user_id = ?1"),
        user_id,
        donor_from_row,
    )
}

fn hospital_by_user(conn: &Connection, user_id: Uuid) -> Result<Option<Hospital>, StoreError> {
    select_one(
        conn,
        &format!("SELECT {HOSPITAL_COLUMNS} FROM hospitals WHERE user_id = ?1"),
        user_id,
        hospital_from_row,
    )
}

fn request_by_id(conn: &Connection, id: Uuid) -> Result<Option<BloodRequest>, StoreError> {
    select_one(
        conn,
        &format!("SELECT {REQUEST_COLUMNS} FROM blood_requests WHERE id = ?1"),
        id,
        request_from_row,
    )
}

fn inventory_row(
    conn: &Connection,
    hospital_id: Uuid,
    blood_type: BloodType,
) -> Result<Option<BloodInventory>, StoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {INVENTORY_COLUMNS} FROM blood_inventory \
                 WHERE hospital_id = ?1 AND blood_type = ?2"
            ),
            params![hospital_id, blood_type],
            inventory_from_row,
        )
        .optional()?)
}

fn upsert_inventory_row(conn: &Connection, row: &BloodInventory) -> Result<BloodInventory, StoreError> {
    conn.execute(
        r"
        INSERT INTO blood_inventory (
            id, hospital_id, blood_type, units_available, units_reserved,
            expiry_date, last_updated
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (hospital_id, blood_type) DO UPDATE SET
            units_available = excluded.units_available,
            units_reserved = excluded.units_reserved,
            expiry_date = excluded.expiry_date,
            last_updated = excluded.last_updated
        ",
        params![
            row.id,
            row.hospital_id,
            row.blood_type,
            row.units_available,
            row.units_reserved,
            row.expiry_date,
            row.last_updated,
        ],
    )
    .map_err(|e| StoreError::classify(e, "blood inventory"))?;

    inventory_row(conn, row.hospital_id, row.blood_type)?.ok_or_else(|| {
        StoreError::NotFound(format!("inventory {} for hospital {}", row.blood_type, row.hospital_id))
    })
}

fn collect<T>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Store for SqliteStore {
    type Error = StoreError;

    fn upsert_user(&self, user: &User) -> Result<User, Self::Error> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO users (id, email, full_name, phone, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (id) DO UPDATE SET
                email = excluded.email,
                full_name = excluded.full_name,
                phone = excluded.phone,
                role = excluded.role,
                updated_at = excluded.updated_at
            ",
            params![
                user.id,
                user.email,
                user.full_name,
                user.phone,
                user.role,
                user.created_at,
                Utc::now(),
            ],
        )
        .map_err(|e| StoreError::classify(e, "user"))?;

        tracing::debug!(user_id = %user.id, role = %user.role, "Upserted user");
        select_one(
            &conn,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            user.id,
            user_from_row,
        )?
        .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>, Self::Error> {
        let conn = self.conn()?;
        select_one(
            &conn,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            id,
            user_from_row,
        )
    }

    fn upsert_donor(&self, donor: &Donor) -> Result<Donor, Self::Error> {
        let conn = self.conn()?;
        let conditions = serde_json::to_string(&donor.medical_conditions)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let (contact_name, contact_phone) = match &donor.emergency_contact {
            Some(c) => (Some(c.name.as_str()), Some(c.phone.as_str())),
            None => (None, None),
        };

        conn.execute(
            r"
            INSERT INTO donors (
                id, user_id, blood_type, date_of_birth, weight_kg, sex,
                last_donation_date, next_eligible_date, medical_conditions,
                emergency_contact_name, emergency_contact_phone,
                street, city, state, zip_code, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            ON CONFLICT (user_id) DO UPDATE SET
                blood_type = excluded.blood_type,
                date_of_birth = excluded.date_of_birth,
                weight_kg = excluded.weight_kg,
                sex = excluded.sex,
                last_donation_date = excluded.last_donation_date,
                next_eligible_date = excluded.next_eligible_date,
                medical_conditions = excluded.medical_conditions,
                emergency_contact_name = excluded.emergency_contact_name,
                emergency_contact_phone = excluded.emergency_contact_phone,
                street = excluded.street,
                city = excluded.city,
                state = excluded.state,
                zip_code = excluded.zip_code,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            ",
            params![
                donor.id,
                donor.user_id,
                donor.blood_type,
                donor.date_of_birth,
                donor.weight_kg,
                donor.sex,
                donor.last_donation_date,
                donor.next_eligible_date,
                conditions,
                contact_name,
                contact_phone,
                donor.address.street,
                donor.address.city,
                donor.address.state,
                donor.address.zip_code,
                donor.is_active,
                donor.created_at,
                Utc::now(),
            ],
        )
        .map_err(|e| StoreError::classify(e, "donor"))?;

        tracing::debug!(user_id = %donor.user_id, blood_type = %donor.blood_type, "Upserted donor");
        donor_by_user(&conn, donor.user_id)?
            .ok_or_else(|| StoreError::NotFound(format!("donor for user {}", donor.user_id)))
    }

    fn get_donor(&self, id: Uuid) -> Result<Option<Donor>, Self::Error> {
        let conn = self.conn()?;
        select_one(
            &conn,
            &format!("SELECT {DONOR_COLUMNS} FROM donors WHERE id = ?1"),
            id,
            donor_from_row,
        )
    }

    fn get_donor_by_user(&self, user_id: Uuid) -> Result<Option<Donor>, Self::Error> {
        let conn = self.conn()?;
        donor_by_user(&conn, user_id)
    }

    fn search_eligible_donors(
        &self,
        blood_type: BloodType,
        today: NaiveDate,
        city: Option<&str>,
    ) -> Result<Vec<Donor>, Self::Error> {
        let conn = self.conn()?;
        collect(
            &conn,
            &format!(
                "SELECT {DONOR_COLUMNS} FROM donors \
                 WHERE blood_type = ?1 AND is_active = 1 AND next_eligible_date <= ?2 \
                   AND (?3 IS NULL OR LOWER(city) LIKE '%' || LOWER(?3) || '%') \
                 ORDER BY next_eligible_date ASC, rowid ASC"
            ),
            &[&blood_type, &today, &city],
            donor_from_row,
        )
    }

    fn donors_eligible_on(&self, date: NaiveDate) -> Result<Vec<Donor>, Self::Error> {
        let conn = self.conn()?;
        collect(
            &conn,
            &format!(
                "SELECT {DONOR_COLUMNS} FROM donors \
                 WHERE is_active = 1 AND next_eligible_date = ?1 ORDER BY rowid ASC"
            ),
            &[&date],
            donor_from_row,
        )
    }

    fn upsert_hospital(&self, hospital: &Hospital) -> Result<Hospital, Self::Error> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO hospitals (
                id, user_id, name, license_number, street, city, state, zip_code,
                phone, email, website, capacity, is_verified, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT (user_id) DO UPDATE SET
                name = excluded.name,
                license_number = excluded.license_number,
                street = excluded.street,
                city = excluded.city,
                state = excluded.state,
                zip_code = excluded.zip_code,
                phone = excluded.phone,
                email = excluded.email,
                website = excluded.website,
                capacity = excluded.capacity,
                is_verified = excluded.is_verified,
                updated_at = excluded.updated_at
            ",
            params![
                hospital.id,
                hospital.user_id,
                hospital.name,
                hospital.license_number,
                hospital.address.street,
                hospital.address.city,
                hospital.address.state,
                hospital.address.zip_code,
                hospital.phone,
                hospital.email,
                hospital.website,
                hospital.capacity,
                hospital.is_verified,
                hospital.created_at,
                Utc::now(),
            ],
        )
        .map_err(|e| StoreError::classify(e, "hospital"))?;

        tracing::debug!(user_id = %hospital.user_id, "Upserted hospital");
        hospital_by_user(&conn, hospital.user_id)?
            .ok_or_else(|| StoreError::NotFound(format!("hospital for user {}", hospital.user_id)))
    }

    fn get_hospital(&self, id: Uuid) -> Result<Option<Hospital>, Self::Error> {
        let conn = self.conn()?;
        select_one(
            &conn,
            &format!("SELECT {HOSPITAL_COLUMNS} FROM hospitals WHERE id = ?1"),
            id,
            hospital_from_row,
        )
    }

    fn get_hospital_by_user(&self, user_id: Uuid) -> Result<Option<Hospital>, Self::Error> {
        let conn = self.conn()?;
        hospital_by_user(&conn, user_id)
    }

    fn verified_hospitals(&self) -> Result<Vec<Hospital>, Self::Error> {
        let conn = self.conn()?;
        collect(
            &conn,
            &format!("SELECT {HOSPITAL_COLUMNS} FROM hospitals WHERE is_verified = 1 ORDER BY name ASC"),
            &[],
            hospital_from_row,
        )
    }

    fn hospital_inventory(&self, hospital_id: Uuid) -> Result<Vec<BloodInventory>, Self::Error> {
        let conn = self.conn()?;
        let mut rows = collect(
            &conn,
            &format!("SELECT {INVENTORY_COLUMNS} FROM blood_inventory WHERE hospital_id = ?1"),
            &[&hospital_id],
            inventory_from_row,
        )?;
        rows.sort_by_key(|row| row.blood_type);
        Ok(rows)
    }

    fn get_inventory(
        &self,
        hospital_id: Uuid,
        blood_type: BloodType,
    ) -> Result<Option<BloodInventory>, Self::Error> {
        let conn = self.conn()?;
        inventory_row(&conn, hospital_id, blood_type)
    }

    fn upsert_inventory(&self, row: &BloodInventory) -> Result<BloodInventory, Self::Error> {
        let conn = self.conn()?;
        let stored = upsert_inventory_row(&conn, row)?;
        tracing::debug!(
            hospital_id = %row.hospital_id,
            blood_type = %row.blood_type,
            units_available = stored.units_available,
            "Upserted inventory"
        );
        Ok(stored)
    }

    fn upsert_inventory_batch(
        &self,
        rows: &[BloodInventory],
    ) -> Result<Vec<BloodInventory>, Self::Error> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let stored = rows
            .iter()
            .map(|row| upsert_inventory_row(&tx, row))
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit()?;
        Ok(stored)
    }

    fn create_request(&self, request: &BloodRequest) -> Result<BloodRequest, Self::Error> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO blood_requests (
                id, hospital_id, blood_type, units_needed, units_fulfilled,
                priority, status, reason, needed_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
            params![
                request.id,
                request.hospital_id,
                request.blood_type,
                request.units_needed,
                request.units_fulfilled,
                request.priority,
                request.status,
                request.reason,
                request.needed_by,
                request.created_at,
                request.updated_at,
            ],
        )
        .map_err(|e| StoreError::classify(e, "blood request"))?;

        request_by_id(&conn, request.id)?
            .ok_or_else(|| StoreError::NotFound(format!("blood request {}", request.id)))
    }

    fn get_request(&self, id: Uuid) -> Result<Option<BloodRequest>, Self::Error> {
        let conn = self.conn()?;
        request_by_id(&conn, id)
    }

    fn update_request(&self, request: &BloodRequest) -> Result<BloodRequest, Self::Error> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r"
            UPDATE blood_requests SET
                units_needed = ?2,
                units_fulfilled = ?3,
                priority = ?4,
                status = ?5,
                reason = ?6,
                needed_by = ?7,
                updated_at = ?8
            WHERE id = ?1
            ",
            params![
                request.id,
                request.units_needed,
                request.units_fulfilled,
                request.priority,
                request.status,
                request.reason,
                request.needed_by,
                Utc::now(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("blood request {}", request.id)));
        }
        request_by_id(&conn, request.id)?
            .ok_or_else(|| StoreError::NotFound(format!("blood request {}", request.id)))
    }

    fn hospital_requests(
        &self,
        hospital_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<BloodRequest>, Self::Error> {
        let conn = self.conn()?;
        collect(
            &conn,
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM blood_requests \
                 WHERE hospital_id = ?1 AND (?2 IS NULL OR status = ?2) \
                 ORDER BY created_at DESC, rowid DESC"
            ),
            &[&hospital_id, &status],
            request_from_row,
        )
    }

    fn active_requests(&self) -> Result<Vec<BloodRequest>, Self::Error> {
        let conn = self.conn()?;
        collect(
            &conn,
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM blood_requests WHERE status = 'open' \
                 ORDER BY CASE priority \
                     WHEN 'urgent' THEN 3 WHEN 'high' THEN 2 WHEN 'medium' THEN 1 ELSE 0 \
                 END DESC, created_at DESC, rowid DESC"
            ),
            &[],
            request_from_row,
        )
    }

    fn record_donation(&self, donation: &Donation) -> Result<Donation, Self::Error> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO donations (
                id, donor_id, hospital_id, blood_request_id, donation_date,
                units_donated, blood_type, hemoglobin_level, blood_pressure_systolic,
                blood_pressure_diastolic, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ",
            params![
                donation.id,
                donation.donor_id,
                donation.hospital_id,
                donation.blood_request_id,
                donation.donation_date,
                donation.units_donated,
                donation.blood_type,
                donation.vitals.hemoglobin_level,
                donation.vitals.blood_pressure_systolic,
                donation.vitals.blood_pressure_diastolic,
                donation.notes,
                donation.created_at,
            ],
        )
        .map_err(|e| StoreError::classify(e, "donation"))?;

        tracing::debug!(donation_id = %donation.id, "Recorded donation");
        select_one(
            &conn,
            &format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1"),
            donation.id,
            donation_from_row,
        )?
        .ok_or_else(|| StoreError::NotFound(format!("donation {}", donation.id)))
    }

    fn hospital_donations(&self, hospital_id: Uuid, limit: usize) -> Result<Vec<Donation>, Self::Error> {
        let conn = self.conn()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        collect(
            &conn,
            &format!(
                "SELECT {DONATION_COLUMNS} FROM donations WHERE hospital_id = ?1 \
                 ORDER BY donation_date DESC, rowid DESC LIMIT ?2"
            ),
            &[&hospital_id, &limit],
            donation_from_row,
        )
    }

    fn hospital_donations_since(
        &self,
        hospital_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<Donation>, Self::Error> {
        let conn = self.conn()?;
        collect(
            &conn,
            &format!(
                "SELECT {DONATION_COLUMNS} FROM donations \
                 WHERE hospital_id = ?1 AND donation_date >= ?2 \
                 ORDER BY donation_date DESC, rowid DESC"
            ),
            &[&hospital_id, &since],
            donation_from_row,
        )
    }

    fn donor_donations(&self, donor_id: Uuid) -> Result<Vec<Donation>, Self::Error> {
        let conn = self.conn()?;
        collect(
            &conn,
            &format!(
                "SELECT {DONATION_COLUMNS} FROM donations WHERE donor_id = ?1 \
                 ORDER BY donation_date DESC, rowid DESC"
            ),
            &[&donor_id],
            donation_from_row,
        )
    }

    fn create_notifications(&self, notifications: &[Notification]) -> Result<usize, Self::Error> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO notifications (
                    id, user_id, title, message, type, is_read, related_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )?;
            for n in notifications {
                stmt.execute(params![
                    n.id,
                    n.user_id,
                    n.title,
                    n.message,
                    n.kind,
                    n.is_read,
                    n.related_id,
                    n.created_at,
                ])
                .map_err(|e| StoreError::classify(e, "notification"))?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = notifications.len(), "Created notifications");
        Ok(notifications.len())
    }

    fn user_notifications(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, Self::Error> {
        let conn = self.conn()?;
        collect(
            &conn,
            &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
                 WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0) \
                 ORDER BY created_at DESC, rowid DESC"
            ),
            &[&user_id, &unread_only],
            notification_from_row,
        )
    }

    fn mark_notification_read(&self, id: Uuid) -> Result<Notification, Self::Error> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("notification {id}")));
        }
        select_one(
            &conn,
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            id,
            notification_from_row,
        )?
        .ok_or_else(|| StoreError::NotFound(format!("notification {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn user(store: &SqliteStore, email: &str, role: UserRole) -> User {
        store
            .upsert_user(&User::new(email, "Test User", role))
            .expect("Should save user")
    }

    fn hospital(store: &SqliteStore, license: &str) -> Hospital {
        let owner = user(store, &format!("{license}@hospital.test"), UserRole::Hospital);
        let address = Address {
            street: "1 Main St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip_code: "62701".into(),
        };
        store
            .upsert_hospital(&Hospital::new(owner.id, format!("Hospital {license}"), license, address, "555-0100"))
            .expect("Should save hospital")
    }

    fn donor_in(store: &SqliteStore, email: &str, bt: BloodType, city: &str, last: Option<NaiveDate>) -> Donor {
        let owner = user(store, email, UserRole::Donor);
        let mut donor = Donor::new(owner.id, bt, date(1990, 1, 1), 70.0, last, date(2024, 6, 1));
        donor.address.city = city.into();
        store.upsert_donor(&donor).expect("Should save donor")
    }

    #[test]
    fn test_user_upsert_updates_in_place() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let mut u = user(&store, "a@example.org", UserRole::Donor);

        u.full_name = "Renamed".into();
        u.role = UserRole::Hospital;
        store.upsert_user(&u).expect("Should update");

        let loaded = store.get_user(u.id).expect("Should load").expect("Should exist");
        assert_eq!(loaded.full_name, "Renamed");
        assert_eq!(loaded.role, UserRole::Hospital);
        assert!(store.get_user(Uuid::new_v4()).expect("Should load").is_none());
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let store = SqliteStore::in_memory().expect("Should create db");
        user(&store, "dup@example.org", UserRole::Donor);
        let err = store
            .upsert_user(&User::new("dup@example.org", "Other", UserRole::Donor))
            .expect_err("Should conflict");
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[test]
    fn test_donor_upsert_keeps_id_per_user() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let first = donor_in(&store, "d@example.org", BloodType::APos, "Springfield", None);

        let mut second = Donor::new(first.user_id, BloodType::ANeg, first.date_of_birth, 80.0, None, date(2024, 6, 1));
        second.medical_conditions.insert("asthma".into());
        second.emergency_contact = Some(EmergencyContact {
            name: "Kin".into(),
            phone: "555-0199".into(),
        });
        let stored = store.upsert_donor(&second).expect("Should upsert");

        assert_eq!(stored.id, first.id);
        assert_eq!(stored.blood_type, BloodType::ANeg);
        assert!(stored.medical_conditions.contains("asthma"));
        assert_eq!(stored.emergency_contact.as_ref().map(|c| c.name.as_str()), Some("Kin"));
        assert_eq!(store.get_donor(first.id).expect("Should load"), Some(stored));
    }

    #[test]
    fn test_donor_for_unknown_user_is_invalid_reference() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let donor = Donor::new(Uuid::new_v4(), BloodType::OPos, date(1990, 1, 1), 70.0, None, date(2024, 1, 1));
        let err = store.upsert_donor(&donor).expect_err("Should fail");
        assert!(matches!(err, StoreError::InvalidReference(_)), "got {err:?}");
    }

    #[test]
    fn test_search_eligible_donors_filters() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let today = date(2024, 6, 1);

        let ready = donor_in(&store, "ready@example.org", BloodType::OPos, "Springfield", Some(date(2024, 3, 1)));
        let _waiting = donor_in(&store, "wait@example.org", BloodType::OPos, "Springfield", Some(date(2024, 5, 20)));
        let _other_type = donor_in(&store, "b@example.org", BloodType::BPos, "Springfield", None);
        let elsewhere = donor_in(&store, "far@example.org", BloodType::OPos, "Shelbyville", None);
        let mut inactive = donor_in(&store, "off@example.org", BloodType::OPos, "Springfield", None);
        inactive.is_active = false;
        store.upsert_donor(&inactive).expect("Should update");

        let all = store.search_eligible_donors(BloodType::OPos, today, None).expect("Should search");
        let ids: Vec<_> = all.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![ready.id, elsewhere.id]);

        let local = store
            .search_eligible_donors(BloodType::OPos, today, Some("SPRING"))
            .expect("Should search");
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].id, ready.id);
    }

    #[test]
    fn test_donors_eligible_on_exact_date() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let d = donor_in(&store, "r@example.org", BloodType::ABNeg, "X", Some(date(2024, 1, 1)));
        assert_eq!(d.next_eligible_date, date(2024, 2, 26));

        let due = store.donors_eligible_on(date(2024, 2, 26)).expect("Should query");
        assert_eq!(due.len(), 1);
        assert!(store.donors_eligible_on(date(2024, 2, 27)).expect("Should query").is_empty());
    }

    #[test]
    fn test_license_number_is_unique() {
        let store = SqliteStore::in_memory().expect("Should create db");
        hospital(&store, "LIC-1");
        let owner = user(&store, "second@hospital.test", UserRole::Hospital);
        let clash = Hospital::new(owner.id, "Clash", "LIC-1", Address::default(), "555-0101");
        let err = store.upsert_hospital(&clash).expect_err("Should conflict");
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[test]
    fn test_verified_hospitals_sorted_by_name() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let mut b = hospital(&store, "B");
        let mut a = hospital(&store, "A");
        hospital(&store, "C");
        b.is_verified = true;
        a.is_verified = true;
        store.upsert_hospital(&b).expect("Should verify");
        store.upsert_hospital(&a).expect("Should verify");

        let names: Vec<_> = store
            .verified_hospitals()
            .expect("Should list")
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, vec!["Hospital A".to_string(), "Hospital B".to_string()]);
    }

    #[test]
    fn test_inventory_unique_per_type_and_ordered() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let h = hospital(&store, "INV");

        let rows: Vec<_> = BloodType::ALL
            .iter()
            .rev()
            .map(|bt| BloodInventory::empty(h.id, *bt))
            .collect();
        store.upsert_inventory_batch(&rows).expect("Should init");

        let mut o_neg = BloodInventory::empty(h.id, BloodType::ONeg);
        o_neg.units_available = 7;
        let stored = store.upsert_inventory(&o_neg).expect("Should upsert");
        assert_eq!(stored.units_available, 7);
        // The original row survives the conflict.
        assert_ne!(stored.id, o_neg.id);

        let listed = store.hospital_inventory(h.id).expect("Should list");
        assert_eq!(listed.len(), 8);
        let types: Vec<_> = listed.iter().map(|r| r.blood_type).collect();
        assert_eq!(types, BloodType::ALL.to_vec());
    }

    #[test]
    fn test_active_requests_ordering() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let h = hospital(&store, "REQ");

        let low = store
            .create_request(&BloodRequest::open(h.id, BloodType::APos, 2, RequestPriority::Low))
            .expect("Should create");
        let urgent = store
            .create_request(&BloodRequest::open(h.id, BloodType::ONeg, 4, RequestPriority::Urgent))
            .expect("Should create");
        let mut closed = store
            .create_request(&BloodRequest::open(h.id, BloodType::BPos, 1, RequestPriority::High))
            .expect("Should create");
        closed.status = RequestStatus::Cancelled;
        store.update_request(&closed).expect("Should update");

        let active: Vec<_> = store.active_requests().expect("Should list").iter().map(|r| r.id).collect();
        assert_eq!(active, vec![urgent.id, low.id]);

        let cancelled = store
            .hospital_requests(h.id, Some(RequestStatus::Cancelled))
            .expect("Should list");
        assert_eq!(cancelled.len(), 1);
        assert_eq!(store.hospital_requests(h.id, None).expect("Should list").len(), 3);
    }

    #[test]
    fn test_update_missing_request_is_not_found() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let req = BloodRequest::open(Uuid::new_v4(), BloodType::APos, 1, RequestPriority::Low);
        let err = store.update_request(&req).expect_err("Should fail");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_donation_queries() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let h = hospital(&store, "DON");
        let d = donor_in(&store, "giver@example.org", BloodType::OPos, "X", None);

        for (m, units) in [(1u32, 1u32), (3, 2), (5, 1)] {
            let mut donation = Donation::new(d.id, h.id, d.blood_type, date(2024, m, 10), units);
            donation.vitals.hemoglobin_level = Some(14.1);
            store.record_donation(&donation).expect("Should record");
        }

        let recent = store.hospital_donations(h.id, 2).expect("Should list");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].donation_date, date(2024, 5, 10));
        assert_eq!(recent[0].vitals.hemoglobin_level, Some(14.1));

        let since = store.hospital_donations_since(h.id, date(2024, 3, 10)).expect("Should list");
        assert_eq!(since.iter().map(|d| d.units_donated).sum::<u32>(), 3);

        assert_eq!(store.donor_donations(d.id).expect("Should list").len(), 3);
    }

    #[test]
    fn test_notifications_read_flow() {
        let store = SqliteStore::in_memory().expect("Should create db");
        let u = user(&store, "n@example.org", UserRole::Donor);

        let batch = vec![
            Notification::new(u.id, NotificationType::UrgentRequest, "Urgent", "Please donate"),
            Notification::new(u.id, NotificationType::EligibilityReminder, "Ready", "You can donate"),
        ];
        assert_eq!(store.create_notifications(&batch).expect("Should create"), 2);

        let read = store.mark_notification_read(batch[0].id).expect("Should mark");
        assert!(read.is_read);

        let unread = store.user_notifications(u.id, true).expect("Should list");
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, batch[1].id);
        assert_eq!(store.user_notifications(u.id, false).expect("Should list").len(), 2);

        let err = store.mark_notification_read(Uuid::new_v4()).expect_err("Should fail");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("lifeflow.db");

        let id = {
            let store = SqliteStore::open(&path).expect("Should open");
            user(&store, "persist@example.org", UserRole::Admin).id
        };

        let store = SqliteStore::open(&path).expect("Should reopen");
        let loaded = store.get_user(id).expect("Should load").expect("Should exist");
        assert_eq!(loaded.role, UserRole::Admin);
    }
}
