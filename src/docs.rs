use crate::api::jobs::{CarryAction, CarryJobReq, CreditJobReq};
use crate::api::ledger::{BalanceResponse, YearQuery};
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse, RejectLeave};
use crate::ledger::carry::CarryRun;
use crate::ledger::credit::CreditRun;
use crate::ledger::drawdown::Deductions;
use crate::ledger::quarter::Quarter;
use crate::model::ledger::LeaveLedger;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leavedesk API",
        version = "1.0.0",
        description = r#"
## Employee Leave Management

This API powers an employee leave-management service built around a
per-user, per-year **leave ledger**.

### Key Features
- **Leave Requests**
  - Submit a request, look it up, and list/filter applications
- **Approvals**
  - Managers and admins approve or reject pending requests; an approval
    deducts the balance in the fixed Q1 -> Q2 -> Q3 -> Q4 -> carried order
- **Balance Ledger**
  - Quarterly credits of 5 days, a 4-per-year optional-holiday allowance,
    and a 50% year-end carry forward
- **Scheduled Jobs**
  - Quarter-start credit and the two-phase year-end carry, invoked by an
    external scheduler with an explicit as-of date

### Security
Endpoints are protected with **JWT Bearer authentication**. Deciding a
request requires the admin role or being the owner's manager; job endpoints
are reserved for the scheduler account.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::ledger::my_balance,
        crate::api::ledger::user_balance,

        crate::api::jobs::quarterly_credit,
        crate::api::jobs::year_end_carry
    ),
    components(
        schemas(
            CreateLeave,
            RejectLeave,
            LeaveFilter,
            LeaveRequest,
            LeaveListResponse,
            LeaveType,
            LeaveStatus,
            LeaveLedger,
            BalanceResponse,
            YearQuery,
            Deductions,
            Quarter,
            CreditJobReq,
            CreditRun,
            CarryAction,
            CarryJobReq,
            CarryRun
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Leave", description = "Leave request and approval APIs"),
        (name = "Ledger", description = "Leave balance APIs"),
        (name = "Jobs", description = "Scheduler-invoked batch jobs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
