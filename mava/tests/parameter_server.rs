use anyhow::Result;
use mava::{
    core::{
        parameters::{counters, ParamValue, Parameters},
        MavaError,
    },
    systems::{
        parameter_server::{ParameterServer, ParameterServerConfig},
        StopSignal,
    },
};
use ndarray::arr1;
use std::{thread, time::Duration};
use test_log::test;

fn x(v: f32) -> Parameters {
    Parameters::from([("x".to_string(), ParamValue::Array(arr1(&[v]).into_dyn()))])
}

#[test]
fn test_set_then_add_through_handles() -> Result<()> {
    let stop = StopSignal::new();
    let mut server = ParameterServer::build(
        ParameterServerConfig::default().non_blocking_sleep_seconds(0.01),
        x(0.0),
        vec![],
        stop.clone(),
    )?;
    let handle = server.handle(Duration::from_secs(5));
    let join = thread::spawn(move || server.run());

    let v1 = handle.set_parameters(x(1.0))?;
    let v2 = handle.clone().add_to_parameters(x(1.0))?;
    assert_eq!(v2, v1 + 1);

    let snapshot = handle.get_parameters(vec!["x".to_string()])?;
    assert_eq!(snapshot.version, v2);
    assert_eq!(snapshot.values["x"], x(2.0)["x"]);

    // A request naming an unknown parameter changes nothing.
    let mut updates = x(1.0);
    updates.insert("y".to_string(), ParamValue::Counter(1));
    let err = handle.add_to_parameters(updates).unwrap_err();
    assert_eq!(
        err.downcast_ref::<MavaError>(),
        Some(&MavaError::UnknownParameter("y".to_string()))
    );
    let snapshot = handle.get_parameters(vec!["x".to_string()])?;
    assert_eq!(snapshot.version, v2);
    assert_eq!(snapshot.values["x"], x(2.0)["x"]);

    stop.stop();
    let stat = join.join().unwrap()?;
    assert_eq!(stat.version, v2);
    Ok(())
}

#[test]
fn test_counters_start_at_zero() -> Result<()> {
    let stop = StopSignal::new();
    let mut server = ParameterServer::build(
        ParameterServerConfig::default().non_blocking_sleep_seconds(0.01),
        Parameters::new(),
        vec![],
        stop.clone(),
    )?;
    let handle = server.handle(Duration::from_secs(5));
    let join = thread::spawn(move || server.run());

    let names = vec![
        counters::TRAINER_STEPS.to_string(),
        counters::EXECUTOR_STEPS.to_string(),
        counters::EVALUATOR_EPISODES.to_string(),
    ];
    let snapshot = handle.get_parameters(names.clone())?;
    for name in names.iter() {
        assert_eq!(snapshot.values[name].as_counter(), Some(0));
    }

    stop.stop();
    join.join().unwrap()?;
    Ok(())
}

#[test]
fn test_counter_overflow_keeps_server_alive() -> Result<()> {
    let stop = StopSignal::new();
    let mut server = ParameterServer::build(
        ParameterServerConfig::default().non_blocking_sleep_seconds(0.01),
        x(0.0),
        vec![],
        stop.clone(),
    )?;
    let handle = server.handle(Duration::from_secs(5));
    let join = thread::spawn(move || server.run());

    let steps = counters::EXECUTOR_STEPS.to_string();
    let v1 = handle.set_parameters(Parameters::from([(
        steps.clone(),
        ParamValue::Counter(i64::MAX),
    )]))?;

    let mut updates = x(1.0);
    updates.insert(steps.clone(), ParamValue::Counter(1));
    let err = handle.add_to_parameters(updates).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MavaError>(),
        Some(MavaError::CounterOverflow { .. })
    ));

    let snapshot = handle.get_parameters(vec!["x".to_string(), steps.clone()])?;
    assert_eq!(snapshot.version, v1);
    assert_eq!(snapshot.values["x"], x(0.0)["x"]);
    assert_eq!(snapshot.values[&steps].as_counter(), Some(i64::MAX));

    stop.stop();
    join.join().unwrap()?;
    Ok(())
}
