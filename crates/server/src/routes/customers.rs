//! CRM customer routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use webshop_crm_core::{CustomerId, CustomerStatus, Email, InteractionType, WebshopId};

use crate::{
    db::{CustomerRepository, OrderRepository},
    error::{AppError, FieldError, MissingExt, NotFoundExt, Validator},
    middleware::{RequireManager, RequireStaff},
    models::{
        Customer, CustomerFilter, CustomerUpdate, Interaction, NewCustomer, NewInteraction,
        OrderSummary, PageRequest,
    },
    state::AppState,
};

use super::{JsonBody, MessageResponse, Paginated};

const DEFAULT_COUNTRY: &str = "Nederland";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
        .route("/{id}/interactions", post(add_interaction))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub webshop_id: Option<WebshopId>,
}

#[derive(Debug, Serialize)]
pub struct CustomerList {
    pub customers: Vec<Customer>,
}

#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub orders: Vec<OrderSummary>,
    pub interactions: Vec<Interaction>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub webshop_id: Option<WebshopId>,
    pub tags: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub customer_status: Option<CustomerStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub message: &'static str,
    pub customer: Customer,
}

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub interaction_type: InteractionType,
    pub subject: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InteractionResponse {
    pub message: &'static str,
    pub interaction: Interaction,
}

#[instrument(skip(_staff, state))]
async fn list(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<CustomerList>>, AppError> {
    let page = PageRequest::new(query.page, query.limit, 20);
    let filter = CustomerFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        status: query.status,
        webshop_id: query.webshop_id,
    };

    let (customers, total) = CustomerRepository::new(state.pool())
        .list(&filter, page)
        .await?;

    Ok(Json(Paginated {
        items: CustomerList { customers },
        pagination: page.paginate(total),
    }))
}

#[instrument(skip(_staff, state))]
async fn show(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<CustomerDetail>, AppError> {
    let customers = CustomerRepository::new(state.pool());
    let customer = customers.get(id).await.or_not_found("Customer")?;
    let orders = OrderRepository::new(state.pool())
        .list_for_customer(id)
        .await?;
    let interactions = customers.list_interactions(id).await?;

    Ok(Json(CustomerDetail {
        customer,
        orders,
        interactions,
    }))
}

#[instrument(skip(_staff, state, body), fields(email = %body.email))]
async fn create(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), AppError> {
    Validator::new()
        .required(&body.first_name, "first_name")
        .required(&body.last_name, "last_name")
        .finish()?;
    let email = Email::normalized(&body.email)
        .map_err(|e| AppError::Validation(vec![FieldError::new("email", e.to_string())]))?;

    let customer = CustomerRepository::new(state.pool())
        .create(&NewCustomer {
            webshop_id: body.webshop_id,
            email,
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            phone: body.phone,
            address: body.address,
            city: body.city,
            postal_code: body.postal_code,
            country: body.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            tags: body.tags,
            notes: body.notes,
        })
        .await?;

    info!(customer_id = %customer.id, "Customer created");
    Ok((
        StatusCode::CREATED,
        Json(CustomerResponse {
            message: "Customer created successfully",
            customer,
        }),
    ))
}

#[instrument(skip(_staff, state, body))]
async fn update(
    RequireStaff(_staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    JsonBody(body): JsonBody<UpdateCustomerRequest>,
) -> Result<Json<CustomerResponse>, AppError> {
    let email = body
        .email
        .as_deref()
        .map(Email::normalized)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let update = CustomerUpdate {
        email,
        first_name: body.first_name,
        last_name: body.last_name,
        phone: body.phone,
        address: body.address,
        city: body.city,
        postal_code: body.postal_code,
        country: body.country,
        customer_status: body.customer_status,
        notes: body.notes,
    };
    if update.is_empty() {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    let customer = CustomerRepository::new(state.pool())
        .update(id, update)
        .await
        .missing_as("Customer")?;

    info!(customer_id = %id, "Customer updated");
    Ok(Json(CustomerResponse {
        message: "Customer updated successfully",
        customer,
    }))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn destroy(
    RequireManager(user): RequireManager,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<MessageResponse>, AppError> {
    CustomerRepository::new(state.pool())
        .delete(id)
        .await
        .missing_as("Customer")?;

    info!(customer_id = %id, "Customer deleted");
    Ok(Json(MessageResponse::new("Customer deleted successfully")))
}

#[instrument(skip(staff, state, body))]
async fn add_interaction(
    RequireStaff(staff): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    JsonBody(body): JsonBody<InteractionRequest>,
) -> Result<(StatusCode, Json<InteractionResponse>), AppError> {
    Validator::new().required(&body.subject, "subject").finish()?;

    let customers = CustomerRepository::new(state.pool());
    customers.get(id).await.or_not_found("Customer")?;

    let interaction = customers
        .add_interaction(&NewInteraction {
            customer_id: id,
            interaction_type: body.interaction_type,
            subject: body.subject.trim().to_string(),
            description: body.description,
            created_by: body
                .created_by
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "System".to_string()),
        })
        .await?;

    info!(customer_id = %id, user_id = %staff.id, "Customer interaction logged");
    Ok((
        StatusCode::CREATED,
        Json(InteractionResponse {
            message: "Interaction added successfully",
            interaction,
        }),
    ))
}
