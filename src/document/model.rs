use chrono::NaiveDate;
use serde::Serialize;

pub const DOC_TYPE_INTRODUCE_GOODS: &str = "LP_INTRODUCE_GOODS";

/// Goods introduction document accepted by the create endpoint.
/// Dates serialize as `YYYY-MM-DD`; wire names are snake_case except `importRequest`.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub description: Description,
    pub doc_id: String,
    pub doc_status: String,
    doc_type: &'static str,
    #[serde(rename = "importRequest")]
    pub import_request: bool,
    pub owner_inn: String,
    pub participant_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub production_type: String,
    pub products: Vec<Product>,
    pub reg_date: NaiveDate,
    pub reg_number: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub participant_inn: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub certificate_document: String,
    pub certificate_document_date: NaiveDate,
    pub certificate_document_number: String,
    pub owner_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub tnved_code: String,
    pub uit_code: String,
    pub uitu_code: String,
}

impl Document {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        description: Description,
        doc_id: String,
        doc_status: String,
        import_request: bool,
        owner_inn: String,
        participant_inn: String,
        producer_inn: String,
        production_date: NaiveDate,
        production_type: String,
        products: Vec<Product>,
        reg_date: NaiveDate,
        reg_number: String,
    ) -> Self {
        Self {
            description,
            doc_id,
            doc_status,
            doc_type: DOC_TYPE_INTRODUCE_GOODS,
            import_request,
            owner_inn,
            participant_inn,
            producer_inn,
            production_date,
            production_type,
            products,
            reg_date,
            reg_number,
        }
    }

    pub fn doc_type(&self) -> &str {
        self.doc_type
    }
}
