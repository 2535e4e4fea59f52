//! Standing description of the employees database, given to the model as its
//! system instruction.

use super::sql_guard::ExecutionMode;

pub const EMPLOYEES_SCHEMA: &str = r#"You are provided with a database schema that contains multiple tables, each with specific columns and properties. Here are the details of the tables:

Table: departments
Columns:
dept_no: type char(4), primary key
dept_name: type varchar(40)

Table: dept_emp
Columns:
emp_no: type INTEGER, primary key
dept_no: type char(4), primary key, foreign key referencing departments(dept_no)
from_date: type date
to_date: type date

Table: dept_manager
Columns:
dept_no: type char(4), primary key, foreign key referencing departments(dept_no)
emp_no: type INTEGER, primary key, foreign key referencing employees(emp_no)
from_date: type date
to_date: type date

Table: employees
Columns:
emp_no: type INTEGER, primary key
birth_date: type date
first_name: type varchar(14)
last_name: type varchar(16)
gender: type TEXT
hire_date: type date

Table: salaries
Columns:
emp_no: type INTEGER, primary key, foreign key referencing employees(emp_no)
salary: type INTEGER
from_date: type date, primary key
to_date: type date

Table: titles
Columns:
emp_no: type INTEGER, primary key, foreign key referencing employees(emp_no)
title: type varchar(50)
from_date: type date, primary key
to_date: type date, nullable
"#;

const READ_ONLY_RULES: &str = "Using the schema provided, you can only query data. \
Write a single SELECT statement per request; statements that insert, update or delete \
records will be rejected.";

const READ_WRITE_RULES: &str = "Using the schema provided, you can perform operations such as \
querying data, inserting new records, updating existing records, and deleting records. \
Please ensure that all SQL operations comply with the relationships and constraints \
specified by the schema. Write a single statement per request.";

/// Schema description plus the operations the current mode permits.
pub fn system_instruction(mode: ExecutionMode) -> String {
    let rules = match mode {
        ExecutionMode::ReadOnly => READ_ONLY_RULES,
        ExecutionMode::ReadWrite => READ_WRITE_RULES,
    };
    format!("{}\n{}\n", EMPLOYEES_SCHEMA, rules)
}
