//! Generates a `samples/` directory of source files suitable for pointing
//! `DATADOCK_DATA_DIR` at: a CSV table, a multi-key JSON object file and a
//! JSON top-level array file.

use std::error::Error;
use std::fs;

use serde_json::json;

fn main() -> Result<(), Box<dyn Error>> {
    fs::create_dir_all("samples")?;

    write_employees_csv()?;
    write_company_json()?;
    write_metrics_json()?;

    println!("Sample files created under samples/");
    println!("Run with: DATADOCK_DATA_DIR=samples datadock");
    Ok(())
}

fn write_employees_csv() -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path("samples/employees.csv")?;
    writer.write_record(["id", "name", "department", "salary", "hire_date", "is_active"])?;
    for i in 1..=50u32 {
        let department = format!("Dept {}", (i % 5) + 1);
        let salary = 30_000 + (i * 1_737) % 90_000;
        let hire_date = format!("2020-{:02}-{:02}", (i % 12) + 1, (i % 28) + 1);
        let is_active = i % 10 != 0;
        writer.write_record([
            i.to_string(),
            format!("Employee {i}"),
            department,
            salary.to_string(),
            hire_date,
            is_active.to_string(),
        ])?;
    }
    writer.flush()?;
    println!("Sample CSV file created: samples/employees.csv");
    Ok(())
}

fn write_company_json() -> Result<(), Box<dyn Error>> {
    let employees: Vec<_> = (1..=20u32)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("Employee {i}"),
                "department": format!("Dept {}", (i % 4) + 1),
                "email": format!("employee{i}@example.com"),
            })
        })
        .collect();
    let departments: Vec<_> = (1..=4u32)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("Department {i}"),
                "manager": format!("Manager {i}"),
                "budget": 100_000 * i,
            })
        })
        .collect();

    let payload = json!({
        "employees": employees,
        "departments": departments,
    });
    fs::write(
        "samples/company.json",
        serde_json::to_string_pretty(&payload)?,
    )?;
    println!("Sample JSON file created: samples/company.json");
    Ok(())
}

fn write_metrics_json() -> Result<(), Box<dyn Error>> {
    let metrics: Vec<_> = (0..24u32)
        .map(|hour| {
            json!({
                "timestamp": format!("2024-01-15T{hour:02}:00:00"),
                "requests": 120 + (hour * 31) % 400,
                "error_rate": f64::from((hour * 7) % 50) / 1000.0,
            })
        })
        .collect();
    fs::write(
        "samples/metrics.json",
        serde_json::to_string_pretty(&metrics)?,
    )?;
    println!("Sample JSON array file created: samples/metrics.json");
    Ok(())
}
