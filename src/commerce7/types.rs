//! Commerce7 REST payloads (only the fields SommScore reads)

use serde::Deserialize;

/// Identifiers arrive as numbers on some endpoints and strings on others
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Identifier {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Number(n) => write!(f, "{}", n),
            Identifier::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalesAssociate {
    #[serde(default)]
    pub name: Option<String>,
}

/// One page of `GET /order`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPage {
    #[serde(default)]
    pub orders: Vec<ApiOrder>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOrder {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub order_number: Option<Identifier>,
    /// ISO-8601 timestamp
    #[serde(default)]
    pub order_paid_date: Option<String>,
    /// Cents
    #[serde(default)]
    pub sub_total: Option<f64>,
    /// Cents
    #[serde(default)]
    pub tip_total: Option<f64>,
    #[serde(default)]
    pub sales_associate: Option<SalesAssociate>,
    #[serde(default)]
    pub external_order_vendor: Option<String>,
}

/// One page of `GET /club-membership`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubPage {
    #[serde(default)]
    pub club_memberships: Vec<ApiClubMembership>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClubRef {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClubMembership {
    pub id: Identifier,
    #[serde(default)]
    pub club: Option<ClubRef>,
    #[serde(default)]
    pub signup_date: Option<String>,
    #[serde(default)]
    pub sales_associate: Option<SalesAssociate>,
}

/// Cursor to request next, or `None` once the last page was read
pub fn next_cursor(cursor: Option<String>) -> Option<String> {
    cursor.filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_page_tolerates_nulls_and_numeric_numbers() {
        let page: OrderPage = serde_json::from_str(
            r#"{
                "orders": [
                    {"id": "o-1", "orderNumber": 1042, "orderPaidDate": "2024-03-09T18:22:00.000Z",
                     "subTotal": 12550, "tipTotal": null, "salesAssociate": {"name": "Ana"},
                     "externalOrderVendor": null},
                    {"orderNumber": "W-7", "salesAssociate": null}
                ],
                "cursor": null,
                "total": 2
            }"#,
        )
        .unwrap();

        assert_eq!(page.orders.len(), 2);
        assert_eq!(page.orders[0].order_number.as_ref().unwrap().to_string(), "1042");
        assert_eq!(page.orders[0].sub_total, Some(12550.0));
        assert_eq!(page.orders[1].order_number.as_ref().unwrap().to_string(), "W-7");
        assert!(page.orders[1].sales_associate.is_none());
        assert_eq!(next_cursor(page.cursor), None);
    }

    #[test]
    fn club_page_reads_nested_fields() {
        let page: ClubPage = serde_json::from_str(
            r#"{"clubMemberships": [{"id": "cm-9", "club": {"title": "Reserve"},
                "signupDate": "2024-02-01T00:00:00Z", "salesAssociate": {"name": "Ben"}}],
                "cursor": "abc"}"#,
        )
        .unwrap();

        let member = &page.club_memberships[0];
        assert_eq!(member.id.to_string(), "cm-9");
        assert_eq!(member.club.as_ref().and_then(|c| c.title.as_deref()), Some("Reserve"));
        assert_eq!(next_cursor(page.cursor).as_deref(), Some("abc"));
        assert_eq!(next_cursor(Some(String::new())), None);
    }
}
