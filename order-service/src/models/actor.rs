/// Tenant-scoped identity performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub company_id: String,
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(company_id: impl Into<String>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            id: id.into(),
            name: name.into(),
        }
    }
}
