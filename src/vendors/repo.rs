use std::collections::HashMap;

use anyhow::Context;
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;

use super::repo_types::{Address, NewAddress, Vendor, VendorFields, VendorSuggestion, VendorWithAddresses};
use crate::documents::attachments::StagedDocuments;

const VENDOR_COLUMNS: &str = r#"
    vendor_id, vendor_name, vendor_type, vendor_tier, pan, gstin, primary_contact_name,
    primary_contact_phone, primary_contact_email, vendor_email, vendor_phone, vendor_status,
    comments, created_at, updated_at
"#;

const ADDRESS_COLUMNS: &str = r#"
    address_id, vendor_id, address_type, address_line_1, address_line_2, city, state,
    zip_code, country, based_office, landmark, created_at, updated_at
"#;

/// Groups addresses under their vendors, keeping vendor order.
fn attach_addresses(vendors: Vec<Vendor>, addresses: Vec<Address>) -> Vec<VendorWithAddresses> {
    let mut by_vendor: HashMap<i32, Vec<Address>> = HashMap::new();
    for a in addresses {
        by_vendor.entry(a.vendor_id).or_default().push(a);
    }
    vendors
        .into_iter()
        .map(|vendor| VendorWithAddresses {
            addresses: by_vendor.remove(&vendor.vendor_id).unwrap_or_default(),
            vendor,
        })
        .collect()
}

pub async fn list_with_addresses(db: &PgPool) -> anyhow::Result<Vec<VendorWithAddresses>> {
    let vendors = sqlx::query_as::<_, Vendor>(&format!(
        "SELECT {VENDOR_COLUMNS} FROM vendor ORDER BY vendor_name"
    ))
    .fetch_all(db)
    .await
    .context("list vendors")?;

    let ids: Vec<i32> = vendors.iter().map(|v| v.vendor_id).collect();
    let addresses = sqlx::query_as::<_, Address>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM address WHERE vendor_id = ANY($1) ORDER BY address_id"
    ))
    .bind(&ids)
    .fetch_all(db)
    .await
    .context("list addresses")?;

    Ok(attach_addresses(vendors, addresses))
}

pub async fn list_active(db: &PgPool) -> anyhow::Result<Vec<Vendor>> {
    let rows = sqlx::query_as::<_, Vendor>(&format!(
        "SELECT {VENDOR_COLUMNS} FROM vendor WHERE vendor_status = 'Active' ORDER BY vendor_name"
    ))
    .fetch_all(db)
    .await
    .context("list active vendors")?;
    Ok(rows)
}

pub async fn search_active(db: &PgPool, query: &str) -> anyhow::Result<Vec<VendorSuggestion>> {
    let rows = sqlx::query_as::<_, VendorSuggestion>(
        r#"
        SELECT vendor_id, vendor_name
        FROM vendor
        WHERE vendor_status = 'Active' AND vendor_name ILIKE $1
        ORDER BY vendor_name
        LIMIT 20
        "#,
    )
    .bind(format!("%{}%", query))
    .fetch_all(db)
    .await
    .context("search vendors")?;
    Ok(rows)
}

pub async fn find(db: &PgPool, vendor_id: i32) -> anyhow::Result<Option<VendorWithAddresses>> {
    let Some(vendor) = sqlx::query_as::<_, Vendor>(&format!(
        "SELECT {VENDOR_COLUMNS} FROM vendor WHERE vendor_id = $1"
    ))
    .bind(vendor_id)
    .fetch_optional(db)
    .await
    .context("find vendor")?
    else {
        return Ok(None);
    };

    let addresses = sqlx::query_as::<_, Address>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM address WHERE vendor_id = $1 ORDER BY address_id"
    ))
    .bind(vendor_id)
    .fetch_all(db)
    .await
    .context("vendor addresses")?;

    Ok(Some(VendorWithAddresses { vendor, addresses }))
}

async fn insert_address(
    conn: &mut PgConnection,
    vendor_id: i32,
    a: &NewAddress,
    now: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO address (
            vendor_id, address_type, address_line_1, address_line_2, city, state,
            zip_code, country, based_office, landmark, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
        "#,
    )
    .bind(vendor_id)
    .bind(&a.address_type)
    .bind(&a.address_line_1)
    .bind(&a.address_line_2)
    .bind(&a.city)
    .bind(&a.state)
    .bind(&a.zip_code)
    .bind(&a.country)
    .bind(a.based_office)
    .bind(&a.landmark)
    .bind(now)
    .execute(&mut *conn)
    .await
    .context("insert address")?;
    Ok(())
}

/// Vendor, main address and attached documents in one transaction.
pub async fn create(
    db: &PgPool,
    fields: &VendorFields,
    address: &NewAddress,
    documents: &StagedDocuments,
    now: OffsetDateTime,
) -> anyhow::Result<i32> {
    let mut tx = db.begin().await?;

    let vendor_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO vendor (
            vendor_name, vendor_type, vendor_tier, pan, gstin, primary_contact_name,
            primary_contact_phone, primary_contact_email, vendor_email, vendor_phone,
            vendor_status, comments, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
        RETURNING vendor_id
        "#,
    )
    .bind(&fields.vendor_name)
    .bind(&fields.vendor_type)
    .bind(&fields.vendor_tier)
    .bind(&fields.pan)
    .bind(&fields.gstin)
    .bind(&fields.primary_contact_name)
    .bind(&fields.primary_contact_phone)
    .bind(&fields.primary_contact_email)
    .bind(&fields.vendor_email)
    .bind(&fields.vendor_phone)
    .bind(&fields.vendor_status)
    .bind(&fields.comments)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .context("insert vendor")?;

    insert_address(&mut *tx, vendor_id, address, now).await?;
    documents.insert_tx(&mut *tx, vendor_id, now).await?;

    tx.commit().await?;
    Ok(vendor_id)
}

/// Returns `false` when the vendor does not exist.
pub async fn update(
    db: &PgPool,
    vendor_id: i32,
    fields: &VendorFields,
    addresses: &[NewAddress],
    documents: &StagedDocuments,
    now: OffsetDateTime,
) -> anyhow::Result<bool> {
    let mut tx = db.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE vendor
        SET vendor_name = $1, vendor_type = $2, vendor_tier = $3, pan = $4, gstin = $5,
            primary_contact_name = $6, primary_contact_phone = $7, primary_contact_email = $8,
            vendor_email = $9, vendor_phone = $10, vendor_status = $11, comments = $12,
            updated_at = $13
        WHERE vendor_id = $14
        "#,
    )
    .bind(&fields.vendor_name)
    .bind(&fields.vendor_type)
    .bind(&fields.vendor_tier)
    .bind(&fields.pan)
    .bind(&fields.gstin)
    .bind(&fields.primary_contact_name)
    .bind(&fields.primary_contact_phone)
    .bind(&fields.primary_contact_email)
    .bind(&fields.vendor_email)
    .bind(&fields.vendor_phone)
    .bind(&fields.vendor_status)
    .bind(&fields.comments)
    .bind(now)
    .bind(vendor_id)
    .execute(&mut *tx)
    .await
    .context("update vendor")?
    .rows_affected();
    if updated == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM address WHERE vendor_id = $1")
        .bind(vendor_id)
        .execute(&mut *tx)
        .await
        .context("clear addresses")?;
    for a in addresses {
        insert_address(&mut *tx, vendor_id, a, now).await?;
    }
    documents.insert_tx(&mut *tx, vendor_id, now).await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn delete(db: &PgPool, vendor_id: i32) -> Result<bool, sqlx::Error> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM address WHERE vendor_id = $1")
        .bind(vendor_id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM vendor WHERE vendor_id = $1")
        .bind(vendor_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendor(id: i32, name: &str) -> Vendor {
        let now = OffsetDateTime::now_utc();
        Vendor {
            vendor_id: id,
            vendor_name: name.into(),
            vendor_type: None,
            vendor_tier: None,
            pan: None,
            gstin: None,
            primary_contact_name: None,
            primary_contact_phone: None,
            primary_contact_email: None,
            vendor_email: None,
            vendor_phone: None,
            vendor_status: "Active".into(),
            comments: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn address(id: i32, vendor_id: i32) -> Address {
        let now = OffsetDateTime::now_utc();
        Address {
            address_id: id,
            vendor_id,
            address_type: "Main".into(),
            address_line_1: Some("1 Main St".into()),
            address_line_2: None,
            city: None,
            state: None,
            zip_code: None,
            country: None,
            based_office: None,
            landmark: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn addresses_group_under_their_vendor() {
        let grouped = attach_addresses(
            vec![vendor(1, "Acme"), vendor(2, "Globex"), vendor(3, "Initech")],
            vec![address(10, 2), address(11, 1), address(12, 2)],
        );
        let counts: Vec<(i32, usize)> = grouped
            .iter()
            .map(|v| (v.vendor.vendor_id, v.addresses.len()))
            .collect();
        assert_eq!(counts, vec![(1, 1), (2, 2), (3, 0)]);
    }

    #[test]
    fn vendor_serializes_flat_with_addresses() {
        let v = VendorWithAddresses {
            vendor: vendor(7, "Acme"),
            addresses: vec![address(1, 7)],
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["vendor_id"], 7);
        assert_eq!(json["addresses"][0]["address_type"], "Main");
    }
}
