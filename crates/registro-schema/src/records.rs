//! Record creation.
//!
//! Each operation is one `INSERT … RETURNING id`. Where a human-facing
//! identifier is generated, the insert itself is the uniqueness check: a
//! collision on the identifier column retries with a fresh candidate, and
//! every other unique violation (a repeated email, say) reaches the caller
//! as [`Error::UniqueViolation`](registro_core::Error::UniqueViolation).

use registro_core::{
  Error, QueryResult, Result, Statement, Store,
  entity::{
    Guardian, GradeRecord, NewGrade, NewGuardian, NewPayment, NewStudent, NewTeacher, Payment,
    Student, Teacher, encode_date,
  },
  ident::IdFamily,
  period::{GradeKind, SchoolYear},
};

use crate::identifiers::{CandidateSource, IdentifierGenerator};

fn returned_id(result: &QueryResult) -> Result<i64> {
  result
    .first()
    .ok_or_else(|| Error::Decode("insert returned no id".to_owned()))?
    .require_integer("id")
}

const INSERT_GUARDIAN: &str = "INSERT INTO representantes (cedula, nombre, email, password)
                               VALUES ($1, $2, $3, $4) RETURNING id";

/// Create a guardian, generating a national ID when none is supplied.
pub async fn create_guardian<S, C>(
  store: &S,
  ids: &IdentifierGenerator<C>,
  new: NewGuardian,
) -> Result<Guardian>
where
  S: Store,
  C: CandidateSource,
{
  let build = |cedula: &str| {
    Statement::new(INSERT_GUARDIAN)
      .bind(cedula)
      .bind(new.name.as_str())
      .bind(new.email.as_str())
      .bind(new.password_hash.as_str())
  };

  let (national_id, result) = match &new.national_id {
    Some(supplied) => {
      let result = store.execute(build(supplied.as_str())).await?;
      (supplied.clone(), result)
    }
    None => {
      let (value, result) = ids
        .insert_with_fresh(store, IdFamily::GuardianNationalId, build)
        .await?;
      (value.parse()?, result)
    }
  };

  let id = returned_id(&result)?;
  tracing::info!(id, national_id = %national_id, "created guardian");
  Ok(Guardian {
    id,
    national_id,
    name: new.name,
    email: new.email,
    password_hash: new.password_hash,
  })
}

/// Create a student with a freshly generated badge number.
pub async fn create_student<S, C>(
  store: &S,
  ids: &IdentifierGenerator<C>,
  new: NewStudent,
) -> Result<Student>
where
  S: Store,
  C: CandidateSource,
{
  let birth_date = new.birth_date.map(encode_date);
  let (badge, result) = ids
    .insert_with_fresh(store, IdFamily::StudentBadge, |carnet| {
      Statement::new(
        "INSERT INTO estudiantes
           (carnet, nombre, cedula, fecha_nacimiento, grado, cedula_representante)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
      )
      .bind(carnet)
      .bind(new.name.as_str())
      .bind(new.national_id.as_deref())
      .bind(birth_date.as_deref())
      .bind(new.grade.as_deref())
      .bind(new.guardian_national_id.as_str())
    })
    .await?;

  let id = returned_id(&result)?;
  tracing::info!(id, badge = %badge, "created student");
  Ok(Student {
    id,
    badge: badge.parse()?,
    name: new.name,
    national_id: new.national_id,
    birth_date: new.birth_date,
    grade: new.grade,
    guardian_national_id: new.guardian_national_id,
  })
}

pub async fn create_teacher<S: Store>(store: &S, new: NewTeacher) -> Result<Teacher> {
  let result = store
    .execute(
      Statement::new(
        "INSERT INTO maestros (cedula, nombre, apellido, email, password, grado_asignado)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
      )
      .bind(new.national_id.as_str())
      .bind(new.name.as_str())
      .bind(new.surname.as_str())
      .bind(new.email.as_str())
      .bind(new.password_hash.as_str())
      .bind(new.assigned_grade.as_deref()),
    )
    .await?;

  let id = returned_id(&result)?;
  tracing::info!(id, "created teacher");
  Ok(Teacher {
    id,
    national_id: new.national_id,
    name: new.name,
    surname: new.surname,
    email: new.email,
    password_hash: new.password_hash,
    assigned_grade: new.assigned_grade,
  })
}

/// Record a grade; its kind follows from the value.
pub async fn record_grade<S: Store>(store: &S, new: NewGrade) -> Result<GradeRecord> {
  let value = new.value.trim().to_owned();
  if value.is_empty() {
    return Err(Error::InvalidValue("grade value is empty".to_owned()));
  }
  let kind = GradeKind::classify(&value);

  let result = store
    .execute(
      Statement::new(
        "INSERT INTO notas (id_estudiante, materia, calificacion, periodo, tipo_calificacion)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
      )
      .bind(new.student_id)
      .bind(new.subject.as_str())
      .bind(value.as_str())
      .bind(new.period.as_str())
      .bind(kind.as_str()),
    )
    .await?;

  Ok(GradeRecord {
    id: returned_id(&result)?,
    student_id: new.student_id,
    subject: new.subject,
    value,
    period: new.period,
    kind,
  })
}

/// Record a payment in the supported school year. A second payment for the
/// same student and month is a [`Error::UniqueViolation`].
pub async fn record_payment<S: Store>(store: &S, new: NewPayment) -> Result<Payment> {
  if !new.amount.is_finite() || new.amount < 0.0 {
    return Err(Error::InvalidValue(format!("payment amount {} is not valid", new.amount)));
  }
  let school_year = SchoolYear::SUPPORTED.label();

  let result = store
    .execute(
      Statement::new(
        "INSERT INTO pagos
           (id_estudiante, monto, mes, anio_escolar, estado, fecha_vencimiento, fecha_pago, concepto)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
      )
      .bind(new.student_id)
      .bind(new.amount)
      .bind(new.month.number())
      .bind(school_year.as_str())
      .bind(new.status.as_str())
      .bind(new.due_date.map(encode_date))
      .bind(new.paid_date.map(encode_date))
      .bind(new.memo.as_deref()),
    )
    .await?;

  let id = returned_id(&result)?;
  tracing::info!(id, student = new.student_id, month = new.month.number(), "recorded payment");
  Ok(Payment {
    id,
    student_id: new.student_id,
    amount: new.amount,
    month: new.month,
    school_year,
    status: new.status,
    due_date: new.due_date,
    paid_date: new.paid_date,
    memo: new.memo,
  })
}
